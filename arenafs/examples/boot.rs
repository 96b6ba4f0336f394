use std::io;

use arenafs::io::{Console, ConsoleLogger, WriteConsole};
use arenafs::{Kernel, KernelConfig};
use log::LevelFilter;

pub fn main() {
    ConsoleLogger::new(WriteConsole(io::stdout()), LevelFilter::Info)
        .install()
        .expect("logger already installed");
    let mut console = WriteConsole(io::stdout());

    let mut kernel = match Kernel::boot(KernelConfig::default()) {
        Ok(kernel) => kernel,
        Err(err) => {
            console.put_str(&format!("Boot failed: {}\n", err));
            return;
        }
    };

    console.put_str("Allocating a page...\n");
    let page = match kernel.allocate_page() {
        Ok(page) => page,
        Err(err) => {
            console.put_str(&format!("Failed to allocate page: {}\n", err));
            return;
        }
    };
    console.put_str("Allocated page at address: ");
    console.put_hex(page.as_u64());
    console.put_str("\nFree memory after allocation: ");
    console.put_hex(kernel.meminfo().free_bytes);
    console.put_str(" bytes\n");

    console.put_str("Freeing the allocated page...\n");
    if let Err(err) = kernel.free_page(page) {
        console.put_str(&format!("Failed to free page: {}\n", err));
        return;
    }
    console.put_str("Free memory after freeing: ");
    console.put_hex(kernel.meminfo().free_bytes);
    console.put_str(" bytes\n");

    let stats = kernel.fs().statfs();
    console.put_str("File system blocks free: ");
    console.put_hex(stats.free_blocks as u64);
    console.put_str("\nPhysical Memory Manager test complete.\n");
}
