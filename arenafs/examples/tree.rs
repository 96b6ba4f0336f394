use arenafs::{EntryKind, FileSystem, FsError, Kernel, KernelConfig};

fn print_tree(fs: &FileSystem<arenafs::io::Arena>, path: &str, depth: usize) -> Result<(), FsError> {
    for entry in fs.list(path)? {
        let child = if path == "/" {
            format!("/{}", entry.name)
        } else {
            format!("{}/{}", path, entry.name)
        };
        match entry.kind {
            EntryKind::Directory => {
                println!("{}[DIR] {}", "  ".repeat(depth), entry.name);
                print_tree(fs, &child, depth + 1)?;
            }
            EntryKind::File => {
                println!("{}[FILE] {} ({} bytes)", "  ".repeat(depth), entry.name, entry.size);
            }
        }
    }
    Ok(())
}

pub fn main() -> Result<(), FsError> {
    let mut kernel = Kernel::boot(KernelConfig::default()).expect("should boot");
    let fs = kernel.fs_mut();

    fs.create_dir("/etc")?;
    fs.create_dir("/var")?;
    fs.create_dir("/var/log")?;
    fs.create_file("/etc/motd", 32)?;
    fs.create_file("/var/log/boot.log", 2048)?;
    fs.write("/etc/motd", b"welcome to the arena", 0)?;

    print_tree(fs, "/", 0)?;

    let motd = fs.read_to_vec("/etc/motd", 20, 0)?;
    println!("motd: {}", String::from_utf8_lossy(&motd));

    let stats = fs.statfs();
    println!(
        "{} of {} blocks used, {} entries free",
        stats.used_blocks, stats.total_blocks, stats.free_entries
    );
    Ok(())
}
