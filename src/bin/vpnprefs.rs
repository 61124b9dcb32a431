use async_trait::async_trait;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::io::{BufRead, Write};
use std::process;
use std::str::FromStr;
use std::sync::Arc;
use vpnprefs_lib::app_dirs;
use vpnprefs_lib::events::{self, BroadcastEmitter};
use vpnprefs_lib::settings::{
  build_layout, content_blocker_state, refresh_content_blocker_rules, resolve_host,
  submit_debug_log, AutoConfirmation, Choice, Cipher, CommandConnectionControl,
  CommandContentBlocker, CommitCoordinator, CommitOutcome, ConfirmationSurface,
  ConnectionControl, Digest, DraftHandle, FileLogSubmitter, Flags, Handshake, JsonFileStorage,
  PreferenceStore, Prompt, ThemeCode, VpnType, PROBE_HOST,
};

/// Asks on the terminal. An empty answer or EOF dismisses the prompt.
struct TerminalConfirmation;

#[async_trait]
impl ConfirmationSurface for TerminalConfirmation {
  async fn present(&self, prompt: Prompt) -> Option<Choice> {
    let options = prompt
      .choices
      .iter()
      .map(Choice::to_string)
      .collect::<Vec<_>>()
      .join(" / ");
    let message = format!("{}\n{options}? ", prompt.message);

    let answer = tokio::task::spawn_blocking(move || {
      print!("{message}");
      let _ = std::io::stdout().flush();
      let mut line = String::new();
      match std::io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line),
      }
    })
    .await
    .ok()
    .flatten()?;

    let choice = match answer.trim().to_lowercase().as_str() {
      "r" | "reconnect" | "reconnect now" => Choice::ReconnectNow,
      "c" | "cancel" => Choice::Cancel,
      "l" | "later" => Choice::Later,
      _ => return None,
    };
    prompt.offers(choice).then_some(choice)
  }
}

fn init_logging(to_file: bool) {
  let mut builder = env_logger::Builder::from_default_env();
  builder
    .filter_level(log::LevelFilter::Info)
    .format_timestamp_millis();

  if to_file {
    let log_path = app_dirs::log_file();
    if let Some(parent) = log_path.parent() {
      let _ = std::fs::create_dir_all(parent);
    }
    let log_file = std::fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(&log_path);
    builder.target(if let Ok(file) = log_file {
      env_logger::Target::Pipe(Box::new(file))
    } else {
      env_logger::Target::Stderr
    });
  }

  builder.init();
}

fn setting_arg(name: &'static str, help: &'static str) -> Arg {
  Arg::new(name).long(name).help(help)
}

fn answer_arg() -> Arg {
  Arg::new("answer")
    .long("answer")
    .value_parser(["reconnect", "cancel", "later"])
    .help("Answer reconnect prompts without asking")
}

fn parse_or_exit<T>(value: &str) -> T
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match value.parse::<T>() {
    Ok(parsed) => parsed,
    Err(e) => {
      eprintln!("{e}");
      process::exit(2);
    }
  }
}

fn open_store() -> Arc<PreferenceStore> {
  match PreferenceStore::open(Arc::new(JsonFileStorage::new())) {
    Ok(store) => Arc::new(store),
    Err(e) => {
      eprintln!("Failed to load preferences: {e}");
      process::exit(1);
    }
  }
}

async fn connection_control() -> Arc<CommandConnectionControl> {
  let control = CommandConnectionControl::from_env();
  if let Err(e) = control.refresh().await {
    log::warn!("Could not read connection status, treating it as unknown: {e}");
  }
  Arc::new(control)
}

fn confirmation(matches: &ArgMatches) -> Arc<dyn ConfirmationSurface> {
  match matches.get_one::<String>("answer").map(String::as_str) {
    Some("reconnect") => Arc::new(AutoConfirmation::new(Choice::ReconnectNow)),
    Some("cancel") => Arc::new(AutoConfirmation::new(Choice::Cancel)),
    Some("later") => Arc::new(AutoConfirmation::new(Choice::Later)),
    _ => Arc::new(TerminalConfirmation),
  }
}

fn apply_edits(draft: &DraftHandle, matches: &ArgMatches) {
  if let Some(value) = matches.get_one::<String>("protocol") {
    draft.set_vpn_type(parse_or_exit::<VpnType>(value));
  }
  if let Some(port) = matches.get_one::<u16>("port") {
    draft.set_preferred_port(*port);
  }
  if let Some(value) = matches.get_one::<String>("cipher") {
    draft.set_cipher(parse_or_exit::<Cipher>(value));
  }
  if let Some(value) = matches.get_one::<String>("digest") {
    draft.set_digest(parse_or_exit::<Digest>(value));
  }
  if let Some(value) = matches.get_one::<String>("handshake") {
    draft.set_handshake(parse_or_exit::<Handshake>(value));
  }
  if let Some(enabled) = matches.get_one::<bool>("persistent") {
    draft.set_persistent_connection(*enabled);
  }
  if let Some(enabled) = matches.get_one::<bool>("mace") {
    draft.set_mace_enabled(*enabled);
  }
  if let Some(server) = matches.get_one::<String>("server") {
    let server = (!server.is_empty()).then(|| server.clone());
    draft.set_preferred_server(server);
  }
}

async fn commit(store: Arc<PreferenceStore>, draft: &DraftHandle, matches: &ArgMatches) {
  let flags = Arc::new(Flags::load());
  let connection: Arc<dyn ConnectionControl> = connection_control().await;
  let coordinator = CommitCoordinator::new(store, connection, confirmation(matches), flags);

  match coordinator.commit_changes(draft).await {
    Ok(CommitOutcome::Applied) => println!("Settings saved."),
    Ok(CommitOutcome::AppliedAndReconnected) => println!("Settings saved, VPN reconnected."),
    Ok(CommitOutcome::AppliedButReconnectFailed(e)) => {
      eprintln!("Settings saved, but the VPN could not reconnect: {e}");
      process::exit(1);
    }
    Ok(CommitOutcome::Cancelled) => println!("No changes were made."),
    Err(e) => {
      eprintln!("Failed to save settings: {e}");
      process::exit(1);
    }
  }
}

async fn show(json: bool) {
  let store = open_store();
  let flags = Flags::load();
  let status = connection_control().await.status();
  let config = store.current_snapshot();
  let blocker_enabled = content_blocker_state(&CommandContentBlocker::from_env()).await;
  let layout = build_layout(&config, &flags, blocker_enabled);

  if json {
    let output = serde_json::json!({
      "status": status,
      "configuration": config,
      "layout": layout,
    });
    match serde_json::to_string_pretty(&output) {
      Ok(text) => println!("{text}"),
      Err(e) => {
        eprintln!("Failed to serialize settings: {e}");
        process::exit(1);
      }
    }
    return;
  }

  println!("VPN: {status}");
  for section in &layout {
    println!();
    println!("{}", section.section.title());
    for row in &section.rows {
      println!("  {row}");
      let options = row.options();
      if !options.is_empty() {
        println!("    options: {}", options.join(", "));
      }
    }
    for note in &section.footnotes {
      println!("  * {}", note.text());
    }
  }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
  let matches = Command::new("vpnprefs")
    .about("Inspect and edit VPN preferences")
    .arg(
      Arg::new("log-file")
        .long("log-file")
        .global(true)
        .action(ArgAction::SetTrue)
        .help("Append logs to the application log file instead of stderr"),
    )
    .subcommand_required(true)
    .subcommand(
      Command::new("show")
        .about("Show the current preferences")
        .arg(
          Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print as JSON"),
        ),
    )
    .subcommand(
      Command::new("edit")
        .about("Change preferences, reconnecting the VPN when needed")
        .arg(setting_arg("protocol", "VPN protocol (ipsec, tunnel)"))
        .arg(
          setting_arg("port", "Remote port, 0 for automatic")
            .value_parser(clap::value_parser!(u16)),
        )
        .arg(setting_arg("cipher", "Data encryption (aes-128-cbc, aes-256-cbc)"))
        .arg(setting_arg("digest", "Data authentication (sha1, sha256)"))
        .arg(setting_arg(
          "handshake",
          "Handshake (rsa2048, rsa3072, rsa4096, ecc256r1, ecc521r1)",
        ))
        .arg(
          setting_arg("persistent", "Reconnect automatically (true, false)")
            .value_parser(clap::value_parser!(bool)),
        )
        .arg(
          setting_arg("mace", "Block ads and trackers (true, false)")
            .value_parser(clap::value_parser!(bool)),
        )
        .arg(setting_arg("server", "Preferred server, empty for automatic"))
        .arg(answer_arg()),
    )
    .subcommand(
      Command::new("theme")
        .about("Switch the application theme")
        .arg(Arg::new("code").required(true).help("Theme (light, dark)")),
    )
    .subcommand(
      Command::new("reset")
        .about("Reset preferences to their defaults")
        .arg(answer_arg()),
    )
    .subcommand(
      Command::new("resolve")
        .about("Resolve a host through the current DNS")
        .arg(Arg::new("host").help("Host to resolve (default: google-analytics.com)")),
    )
    .subcommand(Command::new("flags").about("Show the feature flags in effect"))
    .subcommand(Command::new("debug-log").about("Submit the application log for support"))
    .subcommand(
      Command::new("content-blocker")
        .about("Show the content blocker state")
        .arg(
          Arg::new("reload")
            .long("reload")
            .action(ArgAction::SetTrue)
            .help("Reload the blocker's filter rules"),
        ),
    )
    .get_matches();

  init_logging(matches.get_flag("log-file"));

  let (emitter, _) = BroadcastEmitter::with_capacity(64);
  let mut events_rx = emitter.subscribe();
  if let Err(e) = events::set_global_emitter(Arc::new(emitter)) {
    log::warn!("Event emitter unavailable: {e}");
  }
  tokio::spawn(async move {
    while let Ok(event) = events_rx.recv().await {
      log::debug!("Event {}: {}", event.event_type, event.payload);
    }
  });

  match matches.subcommand() {
    Some(("show", sub)) => show(sub.get_flag("json")).await,
    Some(("edit", sub)) => {
      let store = open_store();
      let draft = match store.begin_edit() {
        Ok(draft) => draft,
        Err(e) => {
          eprintln!("{e}");
          process::exit(1);
        }
      };
      apply_edits(&draft, sub);
      if !draft.has_changes() {
        println!("Nothing to change.");
        return;
      }
      commit(store, &draft, sub).await;
    }
    Some(("theme", sub)) => {
      let code = sub
        .get_one::<String>("code")
        .map(|value| parse_or_exit::<ThemeCode>(value))
        .unwrap_or_default();
      match open_store().set_theme(code) {
        Ok(true) => println!("Theme set to {code}."),
        Ok(false) => println!("Theme is already {code}."),
        Err(e) => {
          eprintln!("Failed to set theme: {e}");
          process::exit(1);
        }
      }
    }
    Some(("reset", sub)) => {
      let store = open_store();
      let draft = match store.begin_edit() {
        Ok(draft) => draft,
        Err(e) => {
          eprintln!("{e}");
          process::exit(1);
        }
      };
      if let Err(e) = draft.reset_to_defaults() {
        eprintln!("Failed to reset theme: {e}");
        process::exit(1);
      }
      commit(store, &draft, sub).await;
    }
    Some(("resolve", sub)) => {
      let host = sub
        .get_one::<String>("host")
        .map(String::as_str)
        .unwrap_or(PROBE_HOST);
      let report = resolve_host(host).await;
      println!("{}: {}", report.host, report.summary());
    }
    Some(("flags", _)) => {
      let flags = Flags::load();
      println!("# {}", app_dirs::flags_file().display());
      match serde_json::to_string_pretty(&flags) {
        Ok(text) => println!("{text}"),
        Err(e) => {
          eprintln!("Failed to serialize flags: {e}");
          process::exit(1);
        }
      }
    }
    Some(("debug-log", _)) => {
      let submitter = FileLogSubmitter::new(app_dirs::log_file(), app_dirs::reports_dir());
      let report = submit_debug_log(&submitter).await;
      println!("{}", report.message());
    }
    Some(("content-blocker", sub)) => {
      let blocker = CommandContentBlocker::from_env();
      if sub.get_flag("reload") {
        if !refresh_content_blocker_rules(&blocker).await {
          eprintln!("Could not reload the content blocker rules.");
          process::exit(1);
        }
        println!("Content blocker rules reloaded.");
      }
      let state = if content_blocker_state(&blocker).await {
        "enabled"
      } else {
        "disabled"
      };
      println!("Content blocker: {state}");
    }
    _ => {
      eprintln!("Unknown command. Run with --help for usage.");
      process::exit(2);
    }
  }
}
