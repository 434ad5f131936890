use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;

use emoface_classifiers::config::{FeatureAlgorithm, ModelType, Selection};
use emoface_classifiers::dataset::DatasetId;
use emoface_classifiers::face_locator::{DetectionMode, FaceBox, SeetaFaceLocator};
use emoface_classifiers::pipeline::{load_photo, recognize_emotion, run_comparison};
use emoface_classifiers::report::write_html_report;
use emoface_cli::input;
use emoface_cli::output::format_recognition;
use emoface_cli::prompt::prompt_choice;

fn config_arg() -> Arg {
    Arg::new("config")
        .help("Path to an experiment JSON configuration file")
        .required(false)
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::FilePath)
}

fn data_dir_arg() -> Arg {
    Arg::new("data_dir")
        .long("data-dir")
        .help("Directory holding the CK+48/ and fer2013/ datasets. Overrides the configuration file.")
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::DirPath)
}

fn dataset_arg() -> Arg {
    Arg::new("dataset")
        .short('d')
        .long("dataset")
        .help("Dataset to train on")
        .value_parser(DatasetId::OPTIONS)
        .ignore_case(true)
}

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("EMOFACE_LOG", "error,emoface=info"))
        .init();

    let matches = Command::new("emoface")
        .version(clap::crate_version!())
        .about("Facial expression recognition: compare feature/model pipelines and recognise emotions in photos")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("compare")
                .about("Train one model/dataset/feature combination and report its test accuracy. Prompts for any choice not given as a flag.")
                .arg(config_arg())
                .arg(
                    Arg::new("model")
                        .short('m')
                        .long("model")
                        .help("Classifier family")
                        .value_parser(ModelType::OPTIONS)
                        .ignore_case(true),
                )
                .arg(dataset_arg())
                .arg(
                    Arg::new("algorithm")
                        .short('a')
                        .long("algorithm")
                        .help("Feature extraction algorithm")
                        .value_parser(FeatureAlgorithm::OPTIONS)
                        .ignore_case(true),
                )
                .arg(data_dir_arg())
                .arg(
                    Arg::new("report")
                        .short('r')
                        .long("report")
                        .help("Also write an HTML report of the evaluation to this file")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(
            Command::new("recognize")
                .about("Train a fisherfaces + CNN pipeline and recognise the emotion of every face in a photo")
                .arg(
                    Arg::new("photo")
                        .help("Path to the photo")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(config_arg())
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .help("How faces are located: run the detector (auto) or use --face boxes (manual)")
                        .value_parser(DetectionMode::OPTIONS)
                        .default_value("auto")
                        .ignore_case(true),
                )
                .arg(dataset_arg().default_value("CK+48"))
                .arg(
                    Arg::new("face")
                        .long("face")
                        .help("Face box as x,y,width,height (manual mode). May be repeated.")
                        .value_parser(|s: &str| s.parse::<FaceBox>().map_err(|e| e.to_string()))
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("detector_model")
                        .long("detector-model")
                        .help("SeetaFace detector model file. Overrides the configuration file.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(data_dir_arg()),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("compare", sub_m)) => handle_compare(sub_m),
        Some(("recognize", sub_m)) => handle_recognize(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_compare(matches: &ArgMatches) -> Result<()> {
    let config = input::from_arguments(matches)?;

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut writer = io::stdout();

    let model: ModelType = match matches.get_one::<String>("model") {
        Some(m) => m.parse()?,
        None => prompt_choice(&mut reader, &mut writer, "Model", &ModelType::OPTIONS)?,
    };
    let dataset: DatasetId = match matches.get_one::<String>("dataset") {
        Some(d) => d.parse()?,
        None => prompt_choice(&mut reader, &mut writer, "Dataset", &DatasetId::OPTIONS)?,
    };
    let algorithm: FeatureAlgorithm = match matches.get_one::<String>("algorithm") {
        Some(a) => a.parse()?,
        None => prompt_choice(&mut reader, &mut writer, "Feature algorithm", &FeatureAlgorithm::OPTIONS)?,
    };

    let selection = Selection {
        model,
        dataset,
        algorithm,
    };
    log::info!(
        "[emoface::compare] model={} dataset={} algorithm={} data_dir={:?}",
        selection.model,
        selection.dataset,
        selection.algorithm,
        config.data_dir
    );

    match run_comparison(&config, &selection) {
        Ok(report) => {
            println!("{}", report);
            if let Some(path) = matches.get_one::<PathBuf>("report") {
                write_html_report(&report, &selection, path)
                    .with_context(|| format!("Failed to write report to {:?}", path))?;
            }
            Ok(())
        }
        Err(e) => {
            log::error!("Comparison failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_recognize(matches: &ArgMatches) -> Result<()> {
    let config = input::from_arguments(matches)?;
    let photo_path = matches
        .get_one::<PathBuf>("photo")
        .context("missing photo path")?;
    let mode: DetectionMode = matches
        .get_one::<String>("mode")
        .map(|m| m.parse())
        .transpose()?
        .unwrap_or(DetectionMode::Auto);
    let dataset: DatasetId = matches
        .get_one::<String>("dataset")
        .map(|d| d.parse())
        .transpose()?
        .unwrap_or(DatasetId::CkPlus48);
    let faces: Vec<FaceBox> = matches
        .get_many::<FaceBox>("face")
        .map(|boxes| boxes.copied().collect())
        .unwrap_or_default();

    log::info!(
        "[emoface::recognize] photo={:?} mode={} dataset={}",
        photo_path,
        mode,
        dataset
    );

    let photo = load_photo(photo_path)
        .with_context(|| format!("Failed to read photo {:?}", photo_path))?;
    let locator = SeetaFaceLocator::new(config.detector.clone()).with_manual_boxes(faces);

    match recognize_emotion(&config, &photo, mode, dataset, &locator) {
        Ok(recognition) => {
            print!("{}", format_recognition(&recognition));
            Ok(())
        }
        Err(e) => {
            log::error!("Recognition failed: {:#}", e);
            std::process::exit(1)
        }
    }
}
