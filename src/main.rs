fn main() {
    if let Err(err) = source_profiler::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
