// bans.rs — persistent ban list
//
// JSON array on disk, split into IP and username indexes in memory.
// Expired non-permanent entries are purged on load. Disk write failures
// are warned about; the in-memory state stays authoritative.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BanType {
    Ip,
    Username,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ban {
    #[serde(rename = "type")]
    pub ban_type: BanType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub name: String,
    pub reason: String,
    pub banned_by: String,
    /// Unix seconds.
    pub banned_at: u64,
    /// Unix seconds; meaningless when permanent.
    pub expires_at: u64,
    pub permanent: bool,
}

impl Ban {
    fn expired(&self, now: u64) -> bool {
        !self.permanent && now >= self.expires_at
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub struct BanManager {
    ip_bans: HashMap<String, Ban>,
    name_bans: HashMap<String, Ban>,
    file_path: PathBuf,
}

impl BanManager {
    pub fn new(file_path: PathBuf) -> Self {
        if let Some(dir) = file_path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                log::warn!("failed to create bans directory: {}", e);
            }
        }
        Self {
            ip_bans: HashMap::new(),
            name_bans: HashMap::new(),
            file_path,
        }
    }

    /// Read the ban file, dropping entries that have expired. A missing
    /// file is an empty list.
    pub fn load(&mut self) -> Result<(), String> {
        let data = match std::fs::read(&self.file_path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(format!("failed to read bans file: {}", e)),
        };

        let bans: Vec<Ban> =
            serde_json::from_slice(&data).map_err(|e| format!("failed to parse bans file: {}", e))?;

        let now = unix_now();
        self.ip_bans.clear();
        self.name_bans.clear();
        for ban in bans {
            if ban.expired(now) {
                continue;
            }
            match ban.ban_type {
                BanType::Ip => {
                    if let Some(ip) = ban.ip.clone() {
                        self.ip_bans.insert(ip, ban);
                    }
                }
                BanType::Username => {
                    self.name_bans.insert(ban.name.clone(), ban);
                }
            }
        }
        Ok(())
    }

    fn save(&self) {
        let bans: Vec<&Ban> = self.ip_bans.values().chain(self.name_bans.values()).collect();
        let data = match serde_json::to_vec_pretty(&bans) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("failed to serialise bans: {}", e);
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.file_path, data) {
            log::warn!("failed to write bans file {}: {}", self.file_path.display(), e);
        }
    }

    pub fn is_banned_ip(&self, ip: &str) -> Option<&Ban> {
        let ban = self.ip_bans.get(ip)?;
        if ban.expired(unix_now()) {
            return None;
        }
        Some(ban)
    }

    pub fn is_banned_name(&self, name: &str) -> Option<&Ban> {
        let ban = self.name_bans.get(name)?;
        if ban.expired(unix_now()) {
            return None;
        }
        Some(ban)
    }

    /// Ban an address. A zero duration is permanent.
    pub fn add_ip_ban(
        &mut self,
        ip: String,
        name: String,
        reason: String,
        banned_by: String,
        duration: Duration,
    ) {
        let now = unix_now();
        let ban = Ban {
            ban_type: BanType::Ip,
            ip: Some(ip.clone()),
            name,
            reason,
            banned_by,
            banned_at: now,
            expires_at: now + duration.as_secs(),
            permanent: duration.is_zero(),
        };
        self.ip_bans.insert(ip, ban);
        self.save();
    }

    pub fn add_name_ban(
        &mut self,
        name: String,
        reason: String,
        banned_by: String,
        duration: Duration,
    ) {
        let now = unix_now();
        let ban = Ban {
            ban_type: BanType::Username,
            ip: None,
            name: name.clone(),
            reason,
            banned_by,
            banned_at: now,
            expires_at: now + duration.as_secs(),
            permanent: duration.is_zero(),
        };
        self.name_bans.insert(name, ban);
        self.save();
    }

    pub fn remove_ip_ban(&mut self, ip: &str) -> bool {
        let removed = self.ip_bans.remove(ip).is_some();
        if removed {
            self.save();
        }
        removed
    }

    pub fn remove_name_ban(&mut self, name: &str) -> bool {
        let removed = self.name_bans.remove(name).is_some();
        if removed {
            self.save();
        }
        removed
    }

    pub fn all(&self) -> Vec<&Ban> {
        let now = unix_now();
        self.ip_bans
            .values()
            .chain(self.name_bans.values())
            .filter(|b| !b.expired(now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_in(dir: &tempfile::TempDir) -> BanManager {
        BanManager::new(dir.path().join("bans.json"))
    }

    #[test]
    fn add_and_lookup_ip_ban() {
        let dir = tempfile::tempdir().unwrap();
        let mut bans = manager_in(&dir);
        bans.add_ip_ban(
            "10.0.0.1".into(),
            "griefer".into(),
            "spam".into(),
            "admin".into(),
            Duration::from_secs(1800),
        );
        assert!(bans.is_banned_ip("10.0.0.1").is_some());
        assert!(bans.is_banned_ip("10.0.0.2").is_none());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut bans = manager_in(&dir);
            bans.add_ip_ban(
                "10.0.0.1".into(),
                "a".into(),
                "r".into(),
                "console".into(),
                Duration::ZERO,
            );
            bans.add_name_ban(
                "cheater".into(),
                "aimbot".into(),
                "console".into(),
                Duration::from_secs(3600),
            );
        }
        let mut bans = manager_in(&dir);
        bans.load().unwrap();
        assert!(bans.is_banned_ip("10.0.0.1").is_some());
        assert!(bans.is_banned_name("cheater").is_some());
        assert_eq!(bans.all().len(), 2);
    }

    #[test]
    fn expired_bans_purged_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bans.json");
        let expired = vec![Ban {
            ban_type: BanType::Ip,
            ip: Some("10.0.0.9".into()),
            name: "old".into(),
            reason: "gone".into(),
            banned_by: "admin".into(),
            banned_at: 1000,
            expires_at: 2000,
            permanent: false,
        }];
        std::fs::write(&path, serde_json::to_vec(&expired).unwrap()).unwrap();

        let mut bans = BanManager::new(path);
        bans.load().unwrap();
        assert!(bans.is_banned_ip("10.0.0.9").is_none());
        assert!(bans.all().is_empty());
    }

    #[test]
    fn permanent_bans_never_expire() {
        let dir = tempfile::tempdir().unwrap();
        let mut bans = manager_in(&dir);
        bans.add_ip_ban(
            "10.1.1.1".into(),
            "p".into(),
            "r".into(),
            "console".into(),
            Duration::ZERO,
        );
        let ban = bans.is_banned_ip("10.1.1.1").unwrap();
        assert!(ban.permanent);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut bans = manager_in(&dir);
        assert!(bans.load().is_ok());
        assert!(bans.all().is_empty());
    }

    #[test]
    fn remove_ban() {
        let dir = tempfile::tempdir().unwrap();
        let mut bans = manager_in(&dir);
        bans.add_name_ban("x".into(), "r".into(), "a".into(), Duration::ZERO);
        assert!(bans.remove_name_ban("x"));
        assert!(!bans.remove_name_ban("x"));
        assert!(bans.is_banned_name("x").is_none());
    }
}
