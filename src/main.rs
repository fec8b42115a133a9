fn main() {
    if let Err(err) = fishbone_rs::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
