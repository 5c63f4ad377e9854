use clap::Parser;

use emotrack::analysis;
use emotrack::config::Config;

fn main() -> anyhow::Result<()> {
    emotrack::init_logger!();

    let config = Config::parse();
    config.validate()?;
    log::debug!("{:?}", config);

    let report = analysis::run(&config)?;
    report.write(&config.report)?;
    println!("Relatório gerado: {}", config.report.display());

    Ok(())
}
