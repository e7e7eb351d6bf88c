//! Game rules and simulation for the ironspade server: player records,
//! movement physics, hit-scan support, grenade ballistics, match state,
//! game modes and the scripting hook chain.

pub mod callbacks;
pub mod gamemode;
pub mod gamestate;
pub mod grenade;
pub mod player;
pub mod pmove;
pub mod weapons;
