// sv_ccmds.rs — chat command dispatch
//
// Slash commands typed into chat. The map metadata can disable
// individual commands; staff commands check the permission mask earned
// through /login.

use crate::server::Server;
use crate::vote::VoteKind;
use ironspade_common::protocol::{disconnect_reason, ChatType};
use ironspade_game::player::{perm, PlayerRef};
use std::time::{Duration, Instant};

const HELP_LINES: &[&str] = &[
    "Commands: /help /status /login /votekick <id> [reason] /y /n /votemap /vote [choice] /cancel",
    "Staff: /kick <id> [reason] /ban <id|name> [minutes] [reason] /unban <ip|name> /banlist",
    "Staff: /mute <id> /unmute <id> /map <name> /savemap [name]",
];

impl Server {
    fn is_command_disabled(&self, name: &str) -> bool {
        self.game
            .map_config
            .extensions
            .disabled_commands
            .iter()
            .any(|c| c.eq_ignore_ascii_case(name))
    }

    /// Returns true when the message was a command (even a failed one)
    /// and must not be echoed as chat.
    pub fn handle_command(&mut self, player: &PlayerRef, message: &str) -> bool {
        let Some(rest) = message.strip_prefix('/') else {
            return false;
        };
        let mut parts = rest.split_whitespace();
        let Some(command) = parts.next() else {
            return false;
        };
        let command = command.to_ascii_lowercase();
        let args: Vec<&str> = parts.collect();

        if self.is_command_disabled(&command) {
            let reply = format!("Command '{}' is disabled for this map.", command);
            self.send_chat_to_player(player, &reply);
            return true;
        }

        match command.as_str() {
            "help" => {
                for line in HELP_LINES {
                    self.send_chat_to_player(player, line);
                }
            }
            "status" => self.cmd_status(player),
            "login" => self.cmd_login(player, &args),
            "votekick" => self.cmd_votekick(player, &args),
            "y" => self.cmd_vote_yes(player, true),
            "n" => self.cmd_vote_yes(player, false),
            "votemap" => self.cmd_votemap(player),
            "vote" => self.cmd_vote(player, &args),
            "cancel" => self.cmd_cancel(player),
            "kick" => self.cmd_kick(player, &args),
            "ban" => self.cmd_ban(player, &args),
            "unban" => self.cmd_unban(player, &args),
            "banlist" => self.cmd_banlist(player),
            "mute" => self.cmd_set_muted(player, &args, true),
            "unmute" => self.cmd_set_muted(player, &args, false),
            "map" => self.cmd_map(player, &args),
            "savemap" => self.cmd_savemap(player, &args),
            _ => {
                self.send_chat_to_player(player, "Unknown command. Type /help for available commands.");
            }
        }
        true
    }

    fn require_staff(&mut self, player: &PlayerRef) -> bool {
        if player.read().permissions & perm::STAFF != 0 {
            return true;
        }
        self.send_chat_to_player(player, "You do not have permission to do that.");
        false
    }

    fn cmd_login(&mut self, player: &PlayerRef, args: &[&str]) {
        let (role, password) = match args {
            [role, password] => (*role, *password),
            _ => {
                self.send_chat_to_player(player, "Usage: /login <role> <password>");
                return;
            }
        };

        let passwords = &self.config.passwords;
        let (expected, bit) = match role {
            "manager" => (passwords.manager.clone(), perm::MANAGER),
            "admin" => (passwords.admin.clone(), perm::ADMIN),
            "moderator" | "mod" => (passwords.moderator.clone(), perm::MODERATOR),
            "guard" => (passwords.guard.clone(), perm::GUARD),
            "trusted" => (passwords.trusted.clone(), perm::TRUSTED),
            _ => {
                self.send_chat_to_player(player, "Unknown role.");
                return;
            }
        };

        if expected.is_empty() || password != expected {
            log::warn!("failed {} login by player {}", role, player.read().id);
            self.send_chat_to_player(player, "Invalid password.");
            return;
        }

        player.write().permissions |= bit;
        let reply = format!("Logged in as {}.", role);
        self.send_chat_to_player(player, &reply);
        log::info!("player {} logged in as {}", player.read().id, role);
    }

    // ============================================================
    // Votes
    // ============================================================

    fn cmd_votekick(&mut self, player: &PlayerRef, args: &[&str]) {
        let Some(victim_id) = args.first().and_then(|a| a.parse::<u8>().ok()) else {
            self.send_chat_to_player(player, "Usage: /votekick <player id> [reason]");
            return;
        };
        let reason = if args.len() > 1 {
            args[1..].join(" ")
        } else {
            "no reason given".to_string()
        };

        let Some(victim) = self.game.players.get(victim_id) else {
            self.send_chat_to_player(player, "Player not found.");
            return;
        };

        let (instigator_id, instigator_name) = {
            let p = player.read();
            (p.id, p.name.clone())
        };
        let (victim_name, victim_is_staff) = {
            let v = victim.read();
            (v.name.clone(), v.permissions & perm::STAFF != 0)
        };
        let count = self.game.ready_player_count();

        let result = self.votes.start_kick(
            instigator_id,
            &instigator_name,
            victim_id,
            &victim_name,
            victim_is_staff,
            &reason,
            count,
            &self.config.voting,
            self.vote_timer_tx.clone(),
            Instant::now(),
        );
        match result {
            Ok(messages) => {
                for message in messages {
                    self.broadcast_chat(&message, ChatType::System);
                }
            }
            Err(e) => self.send_chat_to_player(player, &e),
        }
    }

    fn cmd_vote_yes(&mut self, player: &PlayerRef, yes: bool) {
        let (id, name) = {
            let p = player.read();
            (p.id, p.name.clone())
        };
        let count = self.game.ready_player_count();
        match self.votes.cast_kick(id, &name, yes, count) {
            Ok(update) => {
                for message in &update.messages {
                    self.broadcast_chat(message, ChatType::System);
                }
                if let Some(outcome) = update.outcome {
                    self.apply_vote_outcome(outcome);
                }
            }
            Err(e) => self.send_chat_to_player(player, &e),
        }
    }

    fn cmd_votemap(&mut self, player: &PlayerRef) {
        let (id, name) = {
            let p = player.read();
            (p.id, p.name.clone())
        };
        let rotation = self.config.server.maps.clone();
        let current = self.active_map_name.clone();
        let count = self.game.ready_player_count();

        let result = self.votes.start_map(
            id,
            &name,
            &rotation,
            &current,
            count,
            &self.config.voting,
            self.vote_timer_tx.clone(),
            Instant::now(),
        );
        match result {
            Ok(messages) => {
                for message in messages {
                    self.broadcast_chat(&message, ChatType::System);
                }
            }
            Err(e) => self.send_chat_to_player(player, &e),
        }
    }

    fn cmd_status(&mut self, player: &PlayerRef) {
        let uptime = self.uptime().as_secs();
        let status = format!(
            "{} | map {} | mode {} | {} - {} | up {}h{:02}m",
            self.config.server.name,
            self.active_map_name,
            self.mode.name(),
            self.game.team_score(0),
            self.game.team_score(1),
            uptime / 3600,
            (uptime % 3600) / 60
        );
        self.send_chat_to_player(player, &status);
    }

    fn cmd_vote(&mut self, player: &PlayerRef, args: &[&str]) {
        let Some(choice) = args.first() else {
            // A bare /vote reports the tally.
            let count = self.game.ready_player_count();
            match self.votes.status(count) {
                Some(status) => self.send_chat_to_player(player, &status),
                None => self.send_chat_to_player(player, "No active vote."),
            }
            return;
        };
        // A bare /vote on a votekick counts as yes.
        if matches!(self.votes.active_kind(), Some(VoteKind::Kick(_))) {
            self.cmd_vote_yes(player, true);
            return;
        }

        let (id, name) = {
            let p = player.read();
            (p.id, p.name.clone())
        };
        let count = self.game.ready_player_count();
        match self.votes.cast_map(id, &name, choice, count) {
            Ok(update) => {
                for message in &update.messages {
                    self.broadcast_chat(message, ChatType::System);
                }
                if let Some(outcome) = update.outcome {
                    self.apply_vote_outcome(outcome);
                }
            }
            Err(e) => self.send_chat_to_player(player, &e),
        }
    }

    fn cmd_cancel(&mut self, player: &PlayerRef) {
        let (id, is_staff) = {
            let p = player.read();
            (p.id, p.permissions & perm::STAFF != 0)
        };
        match self.votes.cancel(id, is_staff) {
            Ok(messages) => {
                for message in messages {
                    self.broadcast_chat(&message, ChatType::System);
                }
            }
            Err(e) => self.send_chat_to_player(player, &e),
        }
    }

    // ============================================================
    // Staff commands
    // ============================================================

    fn cmd_kick(&mut self, player: &PlayerRef, args: &[&str]) {
        if !self.require_staff(player) {
            return;
        }
        let Some(victim_id) = args.first().and_then(|a| a.parse::<u8>().ok()) else {
            self.send_chat_to_player(player, "Usage: /kick <player id> [reason]");
            return;
        };
        let reason = if args.len() > 1 {
            args[1..].join(" ")
        } else {
            "kicked by staff".to_string()
        };
        self.kick_player(victim_id, &reason);
    }

    fn cmd_ban(&mut self, player: &PlayerRef, args: &[&str]) {
        if !self.require_staff(player) {
            return;
        }
        let Some(target) = args.first() else {
            self.send_chat_to_player(player, "Usage: /ban <player id|name> [minutes] [reason]");
            return;
        };
        let minutes = args.get(1).and_then(|a| a.parse::<u64>().ok()).unwrap_or(0);
        let reason = if args.len() > 2 {
            args[2..].join(" ")
        } else {
            "banned by staff".to_string()
        };
        let banned_by = player.read().name.clone();

        // A non-numeric target is an offline name ban.
        let Ok(victim_id) = target.parse::<u8>() else {
            self.bans.add_name_ban(
                target.to_string(),
                reason.clone(),
                banned_by,
                Duration::from_secs(minutes * 60),
            );
            let message = format!("Name {} was banned: {}", target, reason);
            self.broadcast_chat(&message, ChatType::System);
            return;
        };

        let Some(victim) = self.game.players.get(victim_id) else {
            self.send_chat_to_player(player, "Player not found.");
            return;
        };
        let (victim_name, peer) = {
            let v = victim.read();
            (v.name.clone(), v.peer)
        };

        if let Some(ip) = self.net.peer_ip(peer) {
            self.bans.add_ip_ban(
                ip.to_string(),
                victim_name.clone(),
                reason.clone(),
                banned_by,
                Duration::from_secs(minutes * 60),
            );
        }
        let message = format!("{} was banned: {}", victim_name, reason);
        self.broadcast_chat(&message, ChatType::System);
        self.net.disconnect_later(peer, disconnect_reason::BANNED);
    }

    fn cmd_unban(&mut self, player: &PlayerRef, args: &[&str]) {
        if !self.require_staff(player) {
            return;
        }
        let Some(target) = args.first() else {
            self.send_chat_to_player(player, "Usage: /unban <ip|name>");
            return;
        };
        let removed = self.bans.remove_ip_ban(target) || self.bans.remove_name_ban(target);
        let reply = if removed {
            format!("Ban on {} lifted.", target)
        } else {
            format!("No ban found for {}.", target)
        };
        self.send_chat_to_player(player, &reply);
    }

    fn cmd_banlist(&mut self, player: &PlayerRef) {
        if !self.require_staff(player) {
            return;
        }
        let lines: Vec<String> = self
            .bans
            .all()
            .iter()
            .map(|b| {
                format!(
                    "{} ({}){}",
                    b.ip.as_deref().unwrap_or(&b.name),
                    b.reason,
                    if b.permanent { " [permanent]" } else { "" }
                )
            })
            .collect();
        if lines.is_empty() {
            self.send_chat_to_player(player, "No active bans.");
            return;
        }
        let count = format!("{} active bans:", lines.len());
        self.send_chat_to_player(player, &count);
        for line in lines.iter().take(10) {
            self.send_chat_to_player(player, line);
        }
    }

    fn cmd_set_muted(&mut self, player: &PlayerRef, args: &[&str], muted: bool) {
        if !self.require_staff(player) {
            return;
        }
        let Some(victim_id) = args.first().and_then(|a| a.parse::<u8>().ok()) else {
            self.send_chat_to_player(player, "Usage: /mute <player id>");
            return;
        };
        let Some(victim) = self.game.players.get(victim_id) else {
            self.send_chat_to_player(player, "Player not found.");
            return;
        };
        let name = {
            let mut v = victim.write();
            v.muted = muted;
            v.name.clone()
        };
        let message = if muted {
            format!("{} was muted.", name)
        } else {
            format!("{} was unmuted.", name)
        };
        self.broadcast_chat(&message, ChatType::System);
    }

    fn cmd_map(&mut self, player: &PlayerRef, args: &[&str]) {
        if !self.require_staff(player) {
            return;
        }
        let Some(map_name) = args.first() else {
            self.send_chat_to_player(player, "Usage: /map <name>");
            return;
        };
        let map_name = map_name.to_string();
        if let Err(e) = self.change_map(&map_name) {
            log::error!("manual map change failed: {}", e);
            let reply = format!("Failed to load map {}.", map_name);
            self.send_chat_to_player(player, &reply);
        }
    }

    fn cmd_savemap(&mut self, player: &PlayerRef, args: &[&str]) {
        if !self.require_staff(player) {
            return;
        }
        let filename = args.first().copied().unwrap_or("");
        match self.save_map(filename) {
            Ok(path) => {
                let reply = format!("Map saved to {}.", path);
                self.send_chat_to_player(player, &reply);
            }
            Err(e) => self.send_chat_to_player(player, &e),
        }
    }

    /// Kick with the reason delivered before the disconnect; clients
    /// that negotiated the kick-reason extension receive it as a system
    /// message from id 255.
    pub fn kick_player(&mut self, victim_id: u8, reason: &str) {
        let Some(victim) = self.game.players.get(victim_id) else {
            return;
        };
        let (name, peer, supports_reason) = {
            let v = victim.read();
            (
                v.name.clone(),
                v.peer,
                v.supports_extension(ironspade_common::protocol::extension_id::KICK_REASON),
            )
        };

        if supports_reason {
            if let Some(encoded) = ironspade_common::strings::to_cp437_bytes(reason) {
                let packet = ironspade_common::protocol::ChatMessage {
                    player_id: 255,
                    chat_type: ChatType::System,
                    message: encoded,
                };
                let data = packet.encode();
                self.send_to_peer(peer, &data, true);
            }
        } else {
            self.send_chat_to_player(&victim, reason);
        }

        let message = format!("{} was kicked: {}", name, reason);
        self.broadcast_chat(&message, ChatType::System);
        self.net.disconnect_later(peer, disconnect_reason::KICKED);
        log::info!("player kicked: {} ({})", name, reason);
    }
}
