use anyhow::Result;

use super::Session;

pub fn run(session: &Session, json: bool) -> Result<()> {
    let library = &session.library;

    if json {
        println!("{}", library.to_json()?);
        return Ok(());
    }

    if library.is_empty() {
        println!("No commands yet.");
        println!(
            "\nTo register a command, add to {}:",
            netcmd_core::AppConfig::config_path().display()
        );
        println!("  [[commands]]");
        println!("  name = \"ping\"");
        println!("  payload = \"AA 55\"");
        return Ok(());
    }

    println!("Commands ({}):\n", library.len());
    for command in library {
        println!("  {}", command.name);
        println!("    {}", command.payload);
    }
    println!("\nDestination: {}", session.destination);

    Ok(())
}
