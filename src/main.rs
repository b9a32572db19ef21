use color_eyre::Result;
use clap::Parser;
use sprout::{Config, Database, JulianDate, Profile, cli::{self, Cli, Commands}, tui::KeyConfirm};

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;
    env_logger::init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev {
        Profile::Dev
    } else {
        Profile::Prod
    };

    let config = match cli.config {
        Some(ref path) => Config::load_from(&sprout::utils::expand_path(path), profile)?,
        None => Config::load_with_profile(profile)?,
    };

    // Initialize database
    let db_path = config.get_database_path();
    let db = Database::new(
        db_path.to_str()
            .ok_or_else(|| color_eyre::eyre::eyre!("Database path contains invalid UTF-8"))?
    )?;

    let command = cli.command.unwrap_or(Commands::Browse { selection: Default::default() });
    match cli::dispatch(command, &db, &config, JulianDate::today(), &mut KeyConfirm) {
        Ok(()) => {}
        Err(e) if e.is_recoverable() => println!("{}", e),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
