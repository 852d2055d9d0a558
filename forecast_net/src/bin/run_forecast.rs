use forecast_net::utils::{parse_datetime, parse_frequency};
use forecast_net::{DefaultBackend, ForecastConfig, ForecastNetwork, LstmNetwork, RunOptions};
use log::info;
use std::env;
use std::error::Error;
use std::process;

const USAGE: &str = "Usage: run_forecast <config.json> <data.csv> <weights> \
[--train] [--evaluate] [--visualize] [--save-data <file>] \
[--start <date>] [--end <date>] [--freq <freq>]";

struct Args {
    config: String,
    data: String,
    weights: String,
    options: RunOptions,
    save_data: Option<String>,
}

fn parse_args(args: &[String]) -> Result<Args, Box<dyn Error>> {
    let mut positional = Vec::new();
    let mut options = RunOptions::default();
    let mut save_data = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} needs a value", flag))
        };
        match arg.as_str() {
            "--train" => options.train = true,
            "--evaluate" => options.evaluate = true,
            "--visualize" => options.visualize = true,
            "--save-data" => save_data = Some(value("--save-data")?),
            "--start" => options.start = Some(parse_datetime(&value("--start")?)?),
            "--end" => options.end = Some(parse_datetime(&value("--end")?)?),
            "--freq" => options.freq = Some(parse_frequency(&value("--freq")?)?),
            flag if flag.starts_with("--") => return Err(format!("Unknown flag {}", flag).into()),
            _ => positional.push(arg.clone()),
        }
    }

    match <[String; 3]>::try_from(positional) {
        Ok([config, data, weights]) => Ok(Args {
            config,
            data,
            weights,
            options,
            save_data,
        }),
        Err(_) => Err(USAGE.into()),
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: &[String]) -> Result<(), Box<dyn Error>> {
    let args = parse_args(args)?;

    let config = ForecastConfig::from_json_file(&args.config)?;
    info!("Loaded configuration from {}", args.config);

    let mut network = LstmNetwork::<DefaultBackend>::from_csv(&args.data, config, Default::default())?;
    let forecast = network.run_model(&args.weights, &args.options)?;

    if let Some(filename) = &args.save_data {
        let path = network.data_handler().save_data(filename)?;
        info!("Preprocessed data written to {}", path.display());
    }

    let targets = forecast.targets().join(",");
    match forecast.timestamps() {
        Some(dates) => {
            println!("timestamp,{}", targets);
            for (date, row) in dates.iter().zip(forecast.values()) {
                let values: Vec<String> = row.iter().map(|v| format!("{:.6}", v)).collect();
                println!("{},{}", date, values.join(","));
            }
        }
        None => {
            println!("{}", targets);
            for row in forecast.values() {
                let values: Vec<String> = row.iter().map(|v| format!("{:.6}", v)).collect();
                println!("{}", values.join(","));
            }
        }
    }

    Ok(())
}
