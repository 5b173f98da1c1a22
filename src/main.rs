use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};

use hires_player_daemon::audio::{CodecFactory, CodecManager, CpalOutput};
use hires_player_daemon::cli::{CliApp, ConsoleCommand, StatusDisplay};
use hires_player_daemon::config::ConfigManager;
use hires_player_daemon::error::{ErrorSeverity, PlayerError};
use hires_player_daemon::library::ScannedLibrary;
use hires_player_daemon::logging::{self, EventLog};
use hires_player_daemon::pidfile::PidFile;
use hires_player_daemon::player::Controller;

/// Ties the controller to the console, the library and the configuration
struct Daemon {
    controller: Arc<Controller>,
    library: ScannedLibrary,
    config_manager: ConfigManager,
    _pidfile: PidFile,
}

impl Daemon {
    fn start(args: &CliApp) -> Result<Self, PlayerError> {
        let config_manager = match &args.config {
            Some(path) => ConfigManager::from_path(path.clone())?,
            None => ConfigManager::new()?,
        };
        info!("Using configuration {}", config_manager.config_path().display());

        // command line overrides are not persisted
        let mut config = config_manager.get_config().clone();
        if let Some(device) = &args.device {
            config.audio.preferred_device = Some(device.clone());
        }

        let pidfile_path = args.pidfile.clone().unwrap_or_else(|| config.daemon.pidfile.clone());
        let pidfile = match PidFile::create(&pidfile_path) {
            Ok(pidfile) => pidfile,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                match PidFile::read(&pidfile_path) {
                    Ok(pid) => error!("Daemon already running with pid {} ({})", pid, pidfile_path.display()),
                    Err(_) => error!("Stale pidfile {}", pidfile_path.display()),
                }
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        let codecs = Arc::new(CodecManager::default());
        let library = match ScannedLibrary::scan(&config.library.roots, codecs.as_ref()) {
            Ok(library) => library,
            Err(e) => {
                warn!("Library scan failed, starting with an empty library: {}", e);
                ScannedLibrary::empty()
            }
        };
        info!(
            "Library: {} files, {} albums, {} directories",
            library.file_count(),
            library.album_count(),
            library.directory_count()
        );

        let output = CpalOutput::new(config.audio.preferred_device.clone(), config.audio.output_buffer_size);
        let codecs: Arc<dyn CodecFactory> = codecs;
        let controller = Arc::new(Controller::with_pipeline(&config.audio, codecs, Box::new(output))?);
        controller.add_listener(Arc::new(EventLog::default()));
        controller.spawn()?;

        Ok(Self {
            controller,
            library,
            config_manager,
            _pidfile: pidfile,
        })
    }

    /// Execute one console command, returns false when the daemon should stop
    fn execute(&mut self, command: ConsoleCommand) -> Result<bool, PlayerError> {
        match command {
            ConsoleCommand::Play => self.controller.play(),
            ConsoleCommand::Pause => self.controller.pause(),
            ConsoleCommand::Stop => self.controller.stop(),
            ConsoleCommand::Next => self.controller.next(),
            ConsoleCommand::Prev => self.controller.prev(),
            ConsoleCommand::GoTo(path) => self.controller.go_to(path),
            ConsoleCommand::Seek(seconds) => self.controller.seek(seconds),
            ConsoleCommand::Volume(level) => {
                self.controller.set_volume(level);
                self.config_manager.set_volume(level)?;
            }
            ConsoleCommand::Add(path) => {
                let item = self.library.item_for_path(&path)?;
                println!("OK: Queued {}", item.label());
                self.controller.queue(item);
            }
            ConsoleCommand::Remove(path) => self.controller.remove(path),
            ConsoleCommand::Clear => self.controller.remove_all(),
            ConsoleCommand::Status => StatusDisplay::display_status(&self.controller.status()),
            ConsoleCommand::Queue => StatusDisplay::display_queue(&self.controller.queue_snapshot()),
            ConsoleCommand::Devices => {
                let devices = CpalOutput::list_devices()?;
                if devices.is_empty() {
                    println!("No audio devices found");
                }
                let preferred = self.config_manager.get_config().audio.preferred_device.as_ref();
                for device in devices {
                    let marker = if Some(&device) == preferred { "*" } else { " " };
                    println!("{} {}", marker, device);
                }
            }
            ConsoleCommand::Help => CliApp::display_help(),
            ConsoleCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    async fn run_interactive_mode(&mut self) {
        println!("Player daemon v{}", env!("CARGO_PKG_VERSION"));
        println!("Type 'help' for available commands, 'exit' or 'quit' to stop.");
        println!();

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let shutdown_flag_clone = shutdown_flag.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            shutdown_flag_clone.store(true, Ordering::Relaxed);
        }) {
            warn!("Could not install the interrupt handler: {}", e);
        }

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        std::thread::spawn(move || {
            let stdin = io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line.trim().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut interval = tokio::time::interval(Duration::from_millis(100));
        let mut awaiting_input = false;

        loop {
            if shutdown_flag.load(Ordering::Relaxed) {
                println!("\nReceived interrupt signal, shutting down");
                break;
            }

            if !awaiting_input {
                print!("> ");
                let _ = io::stdout().flush();
                awaiting_input = true;
            }

            tokio::select! {
                biased;

                line = rx.recv() => {
                    awaiting_input = false;
                    let Some(line) = line else {
                        println!();
                        break;
                    };
                    if line.is_empty() {
                        continue;
                    }

                    let result = CliApp::parse_command(&line)
                        .map_err(PlayerError::from)
                        .and_then(|command| self.execute(command));
                    match result {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => Self::report(&e),
                    }
                }

                _ = interval.tick() => {}
            }
        }
    }

    fn report(error: &PlayerError) {
        match error.severity() {
            ErrorSeverity::Info => info!("{}", error),
            ErrorSeverity::Warning => warn!("{}", error),
            ErrorSeverity::Error | ErrorSeverity::Critical => error!("{}", error),
        }
        StatusDisplay::display_error(error);
    }

    fn shutdown(self) {
        println!("Shutting down...");
        self.controller.shutdown();
        if let Err(e) = self.config_manager.save_config() {
            warn!("Error saving configuration: {}", e);
        }
        println!("Shutdown complete.");
    }
}

#[tokio::main]
async fn main() {
    let args = CliApp::parse();

    if let Err(e) = logging::init(args.log_level.as_deref()) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    if args.list_devices {
        match CpalOutput::list_devices() {
            Ok(devices) => devices.iter().for_each(|device| println!("{}", device)),
            Err(e) => {
                StatusDisplay::display_simple_error(&e.into());
                std::process::exit(1);
            }
        }
        return;
    }

    let mut daemon = match Daemon::start(&args) {
        Ok(daemon) => daemon,
        Err(e) => {
            eprintln!("Failed to start the daemon: {}", e);
            StatusDisplay::display_simple_error(&e);
            std::process::exit(1);
        }
    };

    daemon.run_interactive_mode().await;
    daemon.shutdown();
}
