fn main() {
    if let Err(err) = log_sea::run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
