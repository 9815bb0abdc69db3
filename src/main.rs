use termchat::{cli::Gpt, error::report};
use tracing_subscriber::EnvFilter;

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    if let Err(e) = Gpt::new().run() {
        eprintln!("{}", report(&e));
        std::process::exit(1);
    }
}
