use std::path::PathBuf;

use reel_feed::app::Options;

fn main() {
    env_logger::init();

    let options = match parse_args(std::env::args().skip(1)) {
        Ok(Some(options)) => options,
        Ok(None) => return,
        Err(message) => {
            eprintln!("error: {message}");
            std::process::exit(2);
        }
    };

    if let Err(err) = reel_feed::run(options) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

/// `Ok(None)` means an informational flag was handled and nothing should run.
fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<Options>, String> {
    let mut options = Options::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("Reel-Feed {}", reel_feed::VERSION);
                return Ok(None);
            }
            "--help" | "-h" => {
                println!(
                    "Reel-Feed - Infinite-scroll short video feed controller.\n\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message\n  --offline            Serve built-in sample posts instead of the remote\n  --steps N            Number of items to scroll through (default 10)\n  --user ID            Page through one user's posts\n  --config PATH        Read configuration from PATH"
                );
                return Ok(None);
            }
            "--offline" => options.offline = true,
            "--steps" => {
                let value = args.next().ok_or("--steps needs a value")?;
                options.steps = value
                    .parse()
                    .map_err(|_| format!("--steps expects a number, got {value:?}"))?;
            }
            "--user" => {
                options.user_id = Some(args.next().ok_or("--user needs a value")?);
            }
            "--config" => {
                options.config_file = Some(PathBuf::from(
                    args.next().ok_or("--config needs a value")?,
                ));
            }
            other => return Err(format!("unknown argument {other:?}")),
        }
    }
    Ok(Some(options))
}
