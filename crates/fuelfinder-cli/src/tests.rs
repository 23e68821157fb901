use super::*;
use crate::import::Resources;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["fuelfinder-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["fuelfinder-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["fuelfinder-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn import_without_flags_fetches_everything() {
    let cli = Cli::try_parse_from(["fuelfinder-cli", "import"]).expect("expected valid cli args");
    let Some(Commands::Import { stations, prices }) = cli.command else {
        panic!("expected import command");
    };

    assert_eq!(
        Resources::from_flags(stations, prices),
        Resources {
            stations: true,
            prices: true
        }
    );
}

#[test]
fn import_prices_only() {
    let cli = Cli::try_parse_from(["fuelfinder-cli", "import", "--prices"])
        .expect("expected valid cli args");
    let Some(Commands::Import { stations, prices }) = cli.command else {
        panic!("expected import command");
    };

    assert_eq!(
        Resources::from_flags(stations, prices),
        Resources {
            stations: false,
            prices: true
        }
    );
}

#[test]
fn import_flags_conflict() {
    let result = Cli::try_parse_from(["fuelfinder-cli", "import", "--stations", "--prices"]);
    assert!(result.is_err());
}

#[test]
fn parses_watermarks_command() {
    let cli =
        Cli::try_parse_from(["fuelfinder-cli", "watermarks"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Watermarks)));
}
