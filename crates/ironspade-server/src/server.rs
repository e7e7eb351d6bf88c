// server.rs — server aggregate and lifecycle
//
// Owns the transport, the game state and every manager. The tick thread
// is the only mutator; helper threads (ping, master announce, vote
// timers, periodic messages) feed results back through channels drained
// by the tick loop.

use crate::bans::BanManager;
use crate::masterserver::{self, MasterClient};
use crate::net::NetServer;
use crate::ping::{self, ServerInfo, SharedServerInfo};
use crate::shutdown::ShutdownToken;
use crate::sv_init;
use crate::vote::{VoteCoordinator, VoteTimerEvent};
use crossbeam::channel::{unbounded, Receiver, Sender};
use ironspade_common::config::Config;
use ironspade_common::protocol::GAME_VERSION;
use ironspade_game::callbacks::CallbackChain;
use ironspade_game::gamemode::GameMode;
use ironspade_game::gamestate::GameState;
use ironspade_game::player::PlayerRegistry;
use parking_lot::Mutex;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Messages helper threads hand to the tick thread.
pub enum ControlMsg {
    /// Broadcast one rotating periodic message.
    PeriodicAnnounce(String),
    /// Deferred map change (vote results wait five seconds).
    ChangeMap(String),
}

pub struct Server {
    pub config: Config,
    pub net: NetServer,
    pub game: GameState,
    pub mode: GameMode,
    pub bans: BanManager,
    pub votes: VoteCoordinator,
    pub callbacks: CallbackChain,
    pub shutdown: ShutdownToken,

    pub control_tx: Sender<ControlMsg>,
    pub control_rx: Receiver<ControlMsg>,
    pub vote_timer_tx: Sender<VoteTimerEvent>,
    pub vote_timer_rx: Receiver<VoteTimerEvent>,

    pub ping_info: SharedServerInfo,
    pub masters: Vec<MasterClient>,

    pub start_time: Instant,
    pub current_map: usize,
    pub active_map_name: String,
    pub running: bool,
}

impl Server {
    pub fn new(config: Config, shutdown: ShutdownToken) -> Result<Self, Box<dyn Error>> {
        let mut bans = BanManager::new(PathBuf::from("data/bans.json"));
        if let Err(e) = bans.load() {
            log::warn!("failed to load bans: {}", e);
        }

        let map_name = config.server.maps[0].clone();
        let (map, map_config) = sv_init::load_map_resources(&map_name)?;
        log::info!("map loaded: {}", map_name);

        let registry = Arc::new(PlayerRegistry::new());
        let game = GameState::new(&config, map_config, map, registry);
        let mode = GameMode::new(&config);

        let net = NetServer::bind(config.server.port, config.server.max_players)?;
        log::info!(
            "server listening on port {} ({} slots)",
            config.server.port,
            config.server.max_players
        );

        let ping_info = Arc::new(Mutex::new(ServerInfo {
            name: config.server.name.clone(),
            players_current: 0,
            players_max: config.server.max_players,
            map: map_name.clone(),
            game_mode: mode.name().to_string(),
            game_version: GAME_VERSION.to_string(),
        }));

        let (control_tx, control_rx) = unbounded();
        let (vote_timer_tx, vote_timer_rx) = unbounded();

        Ok(Self {
            config,
            net,
            game,
            mode,
            bans,
            votes: VoteCoordinator::new(),
            callbacks: CallbackChain::new(),
            shutdown,
            control_tx,
            control_rx,
            vote_timer_tx,
            vote_timer_rx,
            ping_info,
            masters: Vec::new(),
            start_time: Instant::now(),
            current_map: 0,
            active_map_name: map_name,
            running: false,
        })
    }

    /// Bring up the helper threads. The tick loop itself is `run`.
    pub fn start(&mut self) {
        self.running = true;
        self.start_time = Instant::now();

        match ping::spawn(
            self.config.server.port + 1,
            Arc::clone(&self.ping_info),
            self.shutdown.clone(),
        ) {
            Ok(_) => {}
            Err(e) => log::warn!("failed to start ping responder: {}", e),
        }

        if self.config.server.master {
            for host in self.config.server.master_hosts.clone() {
                let client = masterserver::spawn(
                    host.host.clone(),
                    host.port,
                    masterserver::Announce {
                        server_name: self.config.server.name.clone(),
                        game_mode: self.mode.name().to_string(),
                        map_name: self.active_map_name.clone(),
                        server_port: self.config.server.port,
                        max_players: self.config.server.max_players as u8,
                    },
                    self.shutdown.clone(),
                );
                log::info!("master server integration enabled: {}", host.host);
                self.masters.push(client);
            }
        }

        self.spawn_periodic_announcements();
        self.update_ping_info();
        self.sync_intel_positions();

        log::info!("server started: {}", self.config.server.name);
    }

    fn spawn_periodic_announcements(&self) {
        let messages = self.config.server.periodic_messages.clone();
        if messages.is_empty() {
            return;
        }
        let tx = self.control_tx.clone();
        let shutdown = self.shutdown.clone();
        let _ = std::thread::Builder::new()
            .name("periodic-messages".to_string())
            .spawn(move || {
                let ticker = crossbeam::channel::tick(Duration::from_secs(180));
                let mut index = 0usize;
                loop {
                    crossbeam::channel::select! {
                        recv(shutdown.channel()) -> _ => return,
                        recv(ticker) -> _ => {
                            if tx.send(ControlMsg::PeriodicAnnounce(messages[index].clone())).is_err() {
                                return;
                            }
                            index = (index + 1) % messages.len();
                        }
                    }
                }
            });
    }

    pub fn notify_masters_player_count(&self) {
        let count = self.game.players.combatant_count() as u8;
        for master in &self.masters {
            master.update(masterserver::MasterUpdate::PlayerCount(count));
        }
    }

    pub fn notify_masters_map(&self, name: &str) {
        for master in &self.masters {
            master.update(masterserver::MasterUpdate::MapName(name.to_string()));
        }
    }

    /// Tear down after the tick loop exits. Safe to call twice.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        log::info!("stopping server");
        self.running = false;

        for player in self.game.players.snapshot() {
            let peer = player.read().peer;
            self.net
                .disconnect(peer, ironspade_common::protocol::disconnect_reason::SHUTDOWN);
        }
        // A few final polls flush the disconnect notifications.
        for _ in 0..256 {
            if self.net.service().is_none() {
                break;
            }
        }

        for master in &mut self.masters {
            master.join();
        }
        log::info!("server stopped");
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn game_time(&self) -> f32 {
        self.start_time.elapsed().as_secs_f32()
    }
}
