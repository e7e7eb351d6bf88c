// rate_limit.rs — per-peer receive-rate accounting
//
// One-second windows tracked on the player record. Packets over the
// total burst cap or a per-type cap are silently dropped; five
// violations disconnect the peer.

use ironspade_common::config::RateLimitConfig;
use ironspade_common::protocol::packet_type;
use ironspade_game::player::Player;
use std::time::{Duration, Instant};

pub const MAX_VIOLATIONS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allow,
    /// Drop the packet, say nothing.
    Drop,
    /// Drop the packet and disconnect the peer.
    Kick,
}

fn per_type_limit(config: &RateLimitConfig, tag: u8) -> u32 {
    match tag {
        packet_type::POSITION_DATA => config.position_packets_per_sec,
        packet_type::ORIENTATION_DATA => config.orient_packets_per_sec,
        packet_type::BLOCK_ACTION | packet_type::BLOCK_LINE => config.block_packets_per_sec,
        _ => config.packets_per_second,
    }
}

/// Account for one received packet and decide its fate.
pub fn check(player: &mut Player, config: &RateLimitConfig, tag: u8, now: Instant) -> RateDecision {
    if !config.enabled {
        return RateDecision::Allow;
    }

    if now.duration_since(player.rate.window_start) >= Duration::from_secs(1) {
        player.rate.reset(now);
    }

    player.rate.total += 1;
    let type_count = player.rate.per_type.entry(tag).or_insert(0);
    *type_count += 1;
    let type_count = *type_count;

    if player.rate.total > config.burst_size {
        player.rate.violations += 1;
        log::warn!(
            "rate limit exceeded (burst): player {} id {} packets {} violations {}",
            player.name,
            player.id,
            player.rate.total,
            player.rate.violations
        );
        return if player.rate.violations >= MAX_VIOLATIONS {
            RateDecision::Kick
        } else {
            RateDecision::Drop
        };
    }

    let limit = per_type_limit(config, tag);
    if limit > 0 && type_count > limit {
        player.rate.violations += 1;
        log::warn!(
            "rate limit exceeded (per-type): player {} id {} type {} count {} limit {} violations {}",
            player.name,
            player.id,
            tag,
            type_count,
            limit,
            player.rate.violations
        );
        return if player.rate.violations >= MAX_VIOLATIONS {
            RateDecision::Kick
        } else {
            RateDecision::Drop
        };
    }

    RateDecision::Allow
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironspade_game::player::PeerHandle;

    fn test_config() -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            packets_per_second: 100,
            burst_size: 150,
            position_packets_per_sec: 60,
            orient_packets_per_sec: 60,
            block_packets_per_sec: 30,
        }
    }

    fn test_player(now: Instant) -> Player {
        Player::new(0, PeerHandle(0), now)
    }

    #[test]
    fn per_type_limit_drops_then_kicks() {
        let config = test_config();
        let now = Instant::now();
        let mut p = test_player(now);

        // 200 position packets inside one window: the first 60 pass, the
        // 61st onward is dropped, and the fifth rejection kicks.
        let mut decisions = Vec::new();
        for _ in 0..200 {
            decisions.push(check(&mut p, &config, packet_type::POSITION_DATA, now));
            if decisions.last() == Some(&RateDecision::Kick) {
                break;
            }
        }

        assert!(decisions[..60].iter().all(|d| *d == RateDecision::Allow));
        assert_eq!(decisions[60], RateDecision::Drop);
        assert_eq!(decisions[61], RateDecision::Drop);
        assert_eq!(decisions[62], RateDecision::Drop);
        assert_eq!(decisions[63], RateDecision::Drop);
        assert_eq!(decisions[64], RateDecision::Kick);
        assert_eq!(p.rate.violations, MAX_VIOLATIONS);
    }

    #[test]
    fn burst_limit_counts_all_types() {
        let config = test_config();
        let now = Instant::now();
        let mut p = test_player(now);

        for i in 0..150u32 {
            let tag = (i % 7 + 3) as u8; // spread across misc types
            assert_eq!(check(&mut p, &config, tag, now), RateDecision::Allow, "i={}", i);
        }
        assert_eq!(check(&mut p, &config, 7, now), RateDecision::Drop);
    }

    #[test]
    fn window_reset_clears_counters() {
        let config = test_config();
        let t0 = Instant::now();
        let mut p = test_player(t0);

        for _ in 0..60 {
            check(&mut p, &config, packet_type::POSITION_DATA, t0);
        }
        assert_eq!(
            check(&mut p, &config, packet_type::POSITION_DATA, t0),
            RateDecision::Drop
        );

        let t1 = t0 + Duration::from_secs(1);
        assert_eq!(
            check(&mut p, &config, packet_type::POSITION_DATA, t1),
            RateDecision::Allow
        );
        // Violations persist across windows.
        assert_eq!(p.rate.violations, 1);
    }

    #[test]
    fn disabled_limiter_allows_everything() {
        let mut config = test_config();
        config.enabled = false;
        let now = Instant::now();
        let mut p = test_player(now);
        for _ in 0..10_000 {
            assert_eq!(
                check(&mut p, &config, packet_type::POSITION_DATA, now),
                RateDecision::Allow
            );
        }
    }
}
