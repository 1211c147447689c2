fn main() {
    if let Err(e) = adwatch_lib::run() {
        eprintln!("adwatch: {}", e);
        std::process::exit(1);
    }
}
