use clap::{Arg, Command};
use log::LevelFilter;
use mailsort::config::Config;
use mailsort::imap::ImapClient;
use mailsort::model::ModelStore;
use mailsort::router::Router;
use mailsort::session::MailSession;
use mailsort::trainer::Trainer;
use mailsort::{classifier, message};
use std::process;

fn main() {
    let matches = Command::new("mailsort")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Classifies incoming mail against folder profiles learned from sorted folders")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("~/.config/mailsort/config.yaml"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .value_parser(["train", "process", "both"])
                .default_value("process")
                .help("Train profiles from folders, process unseen mail, or both"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Write an example configuration file and exit")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("list-folders")
                .long("list-folders")
                .help("List all folders on the mail store and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("show-model")
                .long("show-model")
                .help("Print the persisted model summary and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("classify-file")
                .long("classify-file")
                .value_name("FILE")
                .help("Classify a raw message file against the model and exit")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(path) = matches.get_one::<String>("generate-config") {
        if let Err(e) = std::fs::write(path, Config::example_yaml()) {
            eprintln!("Error writing {path}: {e}");
            process::exit(1);
        }
        println!("Wrote example configuration to {path}");
        return;
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let config = match Config::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
    };

    let store = ModelStore::new(config.model_path());

    if matches.get_flag("show-model") {
        show_model(&store);
        return;
    }

    if let Some(path) = matches.get_one::<String>("classify-file") {
        classify_file(&config, &store, path);
        return;
    }

    let mut session = match connect(&config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Connection failed: {e:#}");
            process::exit(1);
        }
    };

    if matches.get_flag("list-folders") {
        match session.list_folders() {
            Ok(folders) => {
                println!("Available folders:");
                for folder in folders {
                    println!("  {folder}");
                }
            }
            Err(e) => eprintln!("Error listing folders: {e}"),
        }
        let _ = session.logout();
        return;
    }

    let mode = matches.get_one::<String>("mode").unwrap().as_str();
    let mut model = store.load();

    if matches!(mode, "train" | "both") {
        let mut trainer = Trainer::new(&config, &mut model);
        match trainer.train_all(&mut session, &store) {
            Ok(total) => println!("Training pass processed {total} messages"),
            Err(e) => {
                // Losing a finished training pass silently would be worse
                // than stopping, so a failed save is fatal.
                eprintln!("Training failed: {e:#}");
                let _ = session.logout();
                process::exit(1);
            }
        }
    }

    if matches!(mode, "process" | "both") {
        let router = Router::new(&config, &model);
        let processed = router.process_unseen(&mut session);
        println!("Processed {processed} unseen messages");
    }

    if let Err(e) = session.logout() {
        log::warn!("Logout failed: {e}");
    }
}

fn connect(config: &Config) -> anyhow::Result<ImapClient> {
    let (user, password) = config.imap.load_credentials()?;
    let mut client = ImapClient::connect(&config.imap.host, config.imap.port)?;
    client.login(&user, &password)?;
    Ok(client)
}

fn show_model(store: &ModelStore) {
    let model = store.load();
    if model.is_empty() {
        println!("Model at {} is empty", store.path().display());
        return;
    }
    println!("Model at {}", store.path().display());
    println!("  Trained on {} emails", model.total_emails);
    println!(
        "  Last updated: {}",
        model
            .updated_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string())
    );
    for (label, profile) in &model.profiles {
        let total: u64 = profile.values().sum();
        println!("  {label}: {} terms, {total} total counts", profile.len());
    }
}

fn classify_file(config: &Config, store: &ModelStore, path: &str) {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Error reading {path}: {e}");
            process::exit(1);
        }
    };
    let record = match message::parse(&raw, config.routing_snippet_chars) {
        Ok(record) => record,
        Err(e) => {
            eprintln!("Error parsing {path}: {e}");
            process::exit(1);
        }
    };

    let model = store.load();
    let classifier = classifier::Classifier::new(&model, config.min_confidence);
    let result = classifier.classify(&record.subject, Some(&record.body));
    println!("Subject: {}", record.subject);
    println!("From: {}", record.sender);
    println!(
        "Classification: {} (confidence {:.2})",
        result.label, result.confidence
    );
}
