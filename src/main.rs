use env_logger::{Builder, Env};
use log::error;

fn init_logger() {
    // RUST_LOG wins, default is info.
    // Example: RUST_LOG=tablesnap=trace tablesnap list --data-dir /var/lib/data
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = tablesnap::cli::run() {
        error!("{:?}", e);
        std::process::exit(1);
    }
}
