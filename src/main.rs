mod config;
mod error;
mod instance;
mod queryset;
mod recommend;
mod report;
mod request;
mod setup;
mod trace;

use console::style;

use error::Result;
use report::{format_size, RequestReport};
use request::RequestStorage;
use trace::Trace;

fn main() -> Result<()> {
    setup::init_logging();
    let config = setup::init_config();

    let trace = Trace::load(&config.file)?;
    let mut requests = trace.replay();

    if config.json {
        if config.quiet_perfect {
            requests.iter_mut().for_each(RequestStorage::retain_imperfect);
        }
        println!("{}", serde_json::to_string_pretty(&requests)?);
        return Ok(());
    }

    if !config.summary {
        for request in &requests {
            println!(
                "{}",
                RequestReport::new(request, config.base_path.as_deref(), config.quiet_perfect)
            );
        }
    }

    report::summary_table(&requests, config.quiet_perfect).printstd();

    let total = requests
        .iter()
        .map(RequestStorage::total_wasted_memory)
        .fold(0, u64::saturating_add);
    println!(
        "Total wasted memory: {}",
        style(format_size(total)).bold().red()
    );

    Ok(())
}
