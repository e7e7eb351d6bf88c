// protocol.rs — Ace of Spades 0.75 wire protocol
//
// Every frame starts with a one-byte type tag; numeric fields are
// little-endian; colours travel B,G,R; strings are CP437, NUL-padded when
// the packet fixes their length and raw-to-end otherwise. The state-data
// payload (type 15) is conditional on the game mode and carrier flags.

use crate::stream::{PacketReader, PacketWriter, WireError};

pub const MAX_PLAYERS: usize = 32;
pub const PLAYER_NAME_LEN: usize = 16;
pub const TEAM_NAME_LEN: usize = 10;
pub const GAME_VERSION: &str = "0.75";

/// Spectators are team 255 inside the server and team 2 on the wire.
pub const SPECTATOR_TEAM: u8 = 255;
pub const SPECTATOR_WIRE_TEAM: u8 = 2;

/// Map the wire team id onto the internal id, rejecting unknown values.
pub fn to_internal_team(team: u8) -> Option<u8> {
    match team {
        0 | 1 => Some(team),
        SPECTATOR_WIRE_TEAM | SPECTATOR_TEAM => Some(SPECTATOR_TEAM),
        _ => None,
    }
}

pub fn to_wire_team(team: u8) -> u8 {
    if team == SPECTATOR_TEAM {
        SPECTATOR_WIRE_TEAM
    } else {
        team
    }
}

// ============================================================
// Type tags and small enums
// ============================================================

pub mod packet_type {
    pub const POSITION_DATA: u8 = 0;
    pub const ORIENTATION_DATA: u8 = 1;
    pub const WORLD_UPDATE: u8 = 2;
    pub const INPUT_DATA: u8 = 3;
    pub const WEAPON_INPUT: u8 = 4;
    /// Client to server this is Hit; server to client it is SetHP.
    pub const HIT: u8 = 5;
    pub const SET_HP: u8 = 5;
    pub const GRENADE: u8 = 6;
    pub const SET_TOOL: u8 = 7;
    pub const SET_COLOR: u8 = 8;
    pub const EXISTING_PLAYER: u8 = 9;
    pub const SHORT_PLAYER_DATA: u8 = 10;
    pub const MOVE_OBJECT: u8 = 11;
    pub const CREATE_PLAYER: u8 = 12;
    pub const BLOCK_ACTION: u8 = 13;
    pub const BLOCK_LINE: u8 = 14;
    pub const STATE_DATA: u8 = 15;
    pub const KILL_ACTION: u8 = 16;
    pub const CHAT_MESSAGE: u8 = 17;
    pub const MAP_START: u8 = 18;
    pub const MAP_CHUNK: u8 = 19;
    pub const PLAYER_LEFT: u8 = 20;
    pub const TERRITORY_CAPTURE: u8 = 21;
    pub const PROGRESS_BAR: u8 = 22;
    pub const INTEL_CAPTURE: u8 = 23;
    pub const INTEL_PICKUP: u8 = 24;
    pub const INTEL_DROP: u8 = 25;
    pub const RESTOCK: u8 = 26;
    pub const FOG_COLOR: u8 = 27;
    pub const WEAPON_RELOAD: u8 = 28;
    pub const CHANGE_TEAM: u8 = 29;
    pub const CHANGE_WEAPON: u8 = 30;
    pub const HANDSHAKE_INIT: u8 = 31;
    pub const HANDSHAKE_RETURN: u8 = 32;
    pub const VERSION_REQUEST: u8 = 33;
    pub const VERSION_RESPONSE: u8 = 34;
    pub const EXTENSION_INFO: u8 = 60;
    pub const PLAYER_PROPERTIES: u8 = 64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WeaponType {
    Rifle = 0,
    Smg = 1,
    Shotgun = 2,
}

impl WeaponType {
    pub fn from_u8(v: u8) -> Result<Self, WireError> {
        match v {
            0 => Ok(WeaponType::Rifle),
            1 => Ok(WeaponType::Smg),
            2 => Ok(WeaponType::Shotgun),
            _ => Err(WireError::BadEnum {
                field: "weapon",
                value: v,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ItemType {
    Spade = 0,
    Block = 1,
    Gun = 2,
    Grenade = 3,
}

impl ItemType {
    pub fn from_u8(v: u8) -> Result<Self, WireError> {
        match v {
            0 => Ok(ItemType::Spade),
            1 => Ok(ItemType::Block),
            2 => Ok(ItemType::Gun),
            3 => Ok(ItemType::Grenade),
            _ => Err(WireError::BadEnum {
                field: "tool",
                value: v,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HitType {
    Torso = 0,
    Head = 1,
    Arms = 2,
    Legs = 3,
    Melee = 4,
}

impl HitType {
    pub fn from_u8(v: u8) -> Result<Self, WireError> {
        match v {
            0 => Ok(HitType::Torso),
            1 => Ok(HitType::Head),
            2 => Ok(HitType::Arms),
            3 => Ok(HitType::Legs),
            4 => Ok(HitType::Melee),
            _ => Err(WireError::BadEnum {
                field: "hit_type",
                value: v,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KillType {
    Weapon = 0,
    Headshot = 1,
    Melee = 2,
    Grenade = 3,
    Fall = 4,
    TeamChange = 5,
    ClassChange = 6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChatType {
    All = 0,
    Team = 1,
    System = 2,
    Big = 3,
    Info = 4,
    Warning = 5,
    Error = 6,
}

impl ChatType {
    pub fn from_u8(v: u8) -> Result<Self, WireError> {
        match v {
            0 => Ok(ChatType::All),
            1 => Ok(ChatType::Team),
            2 => Ok(ChatType::System),
            3 => Ok(ChatType::Big),
            4 => Ok(ChatType::Info),
            5 => Ok(ChatType::Warning),
            6 => Ok(ChatType::Error),
            _ => Err(WireError::BadEnum {
                field: "chat_type",
                value: v,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockActionType {
    Build = 0,
    SpadeGunDestroy = 1,
    SpadeSecondaryDestroy = 2,
    GrenadeDestroy = 3,
}

impl BlockActionType {
    pub fn from_u8(v: u8) -> Result<Self, WireError> {
        match v {
            0 => Ok(BlockActionType::Build),
            1 => Ok(BlockActionType::SpadeGunDestroy),
            2 => Ok(BlockActionType::SpadeSecondaryDestroy),
            3 => Ok(BlockActionType::GrenadeDestroy),
            _ => Err(WireError::BadEnum {
                field: "block_action",
                value: v,
            }),
        }
    }
}

/// ENet disconnect data values understood by 0.75 clients.
pub mod disconnect_reason {
    pub const UNDEFINED: u32 = 0;
    pub const BANNED: u32 = 1;
    pub const IP_LIMIT: u32 = 2;
    pub const WRONG_VERSION: u32 = 3;
    pub const SERVER_FULL: u32 = 4;
    pub const SHUTDOWN: u32 = 5;
    pub const KICKED: u32 = 10;
    pub const INVALID_NAME: u32 = 20;
}

/// Wire game-mode tag in the state-data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireGamemode {
    Ctf = 0,
    Tc = 1,
}

// Key state bits (input-data packet).
pub mod key_state {
    pub const FORWARD: u8 = 1 << 0;
    pub const BACKWARD: u8 = 1 << 1;
    pub const LEFT: u8 = 1 << 2;
    pub const RIGHT: u8 = 1 << 3;
    pub const JUMP: u8 = 1 << 4;
    pub const CROUCH: u8 = 1 << 5;
    pub const SNEAK: u8 = 1 << 6;
    pub const SPRINT: u8 = 1 << 7;
}

// Weapon input bits.
pub mod weapon_input {
    pub const PRIMARY: u8 = 1 << 0;
    pub const SECONDARY: u8 = 1 << 1;
}

// Protocol extensions negotiated via packet 60.
pub mod extension_id {
    pub const PLAYER_PROPERTIES: u8 = 0;
    pub const PLAYERS_256: u8 = 192;
    pub const MESSAGE_TYPES: u8 = 193;
    pub const KICK_REASON: u8 = 194;
}

// ============================================================
// Weapon constants, protocol revision 75
// ============================================================

pub const INITIAL_HP: u8 = 100;
pub const INITIAL_BLOCKS: u8 = 50;
pub const INITIAL_GRENADES: u8 = 3;
pub const MAX_HP: u8 = 100;
pub const MAX_BLOCKS: u8 = 50;
pub const MAX_GRENADES: u8 = 3;

pub fn default_magazine_ammo(weapon: WeaponType) -> u8 {
    match weapon {
        WeaponType::Rifle => 10,
        WeaponType::Smg => 30,
        WeaponType::Shotgun => 6,
    }
}

pub fn default_reserve_ammo(weapon: WeaponType) -> u8 {
    match weapon {
        WeaponType::Rifle => 50,
        WeaponType::Smg => 120,
        WeaponType::Shotgun => 48,
    }
}

/// Minimum delay between shots, in milliseconds.
pub fn fire_delay_millis(weapon: WeaponType) -> u64 {
    match weapon {
        WeaponType::Rifle => 500,
        WeaponType::Smg => 100,
        WeaponType::Shotgun => 1000,
    }
}

pub fn pellet_count(weapon: WeaponType) -> usize {
    match weapon {
        WeaponType::Rifle => 1,
        WeaponType::Smg => 1,
        WeaponType::Shotgun => 8,
    }
}

// ============================================================
// Geometry and colour primitives
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn scale(self, f: f32) -> Vec3 {
        Vec3::new(self.x * f, self.y * f, self.z * f)
    }

    /// Unit vector, or `None` for (near-)zero input.
    pub fn normalized(self) -> Option<Vec3> {
        let len = self.length();
        if len.abs() < 1e-6 {
            return None;
        }
        Some(self.scale(1.0 / len))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vec3i {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Vec3i {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// 24-bit colour in wire byte order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Color3b {
    pub b: u8,
    pub g: u8,
    pub r: u8,
}

impl Color3b {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { b, g, r }
    }

    pub fn to_rgb_u32(self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    pub fn from_rgb_u32(v: u32) -> Self {
        Self {
            b: (v & 0xFF) as u8,
            g: ((v >> 8) & 0xFF) as u8,
            r: ((v >> 16) & 0xFF) as u8,
        }
    }
}

fn read_vec3(r: &mut PacketReader) -> Result<Vec3, WireError> {
    Ok(Vec3::new(r.read_f32()?, r.read_f32()?, r.read_f32()?))
}

fn write_vec3(w: &mut PacketWriter, v: Vec3) {
    w.write_f32(v.x);
    w.write_f32(v.y);
    w.write_f32(v.z);
}

fn read_color(r: &mut PacketReader) -> Result<Color3b, WireError> {
    Ok(Color3b {
        b: r.read_u8()?,
        g: r.read_u8()?,
        r: r.read_u8()?,
    })
}

fn write_color(w: &mut PacketWriter, c: Color3b) {
    w.write_u8(c.b);
    w.write_u8(c.g);
    w.write_u8(c.r);
}

/// Read the type tag off a raw frame.
pub fn frame_type(data: &[u8]) -> Result<u8, WireError> {
    data.first().copied().ok_or(WireError::TooShort { want: 1, have: 0 })
}

// ============================================================
// Movement and telemetry packets
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionData {
    pub position: Vec3,
}

impl PositionData {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(13);
        w.write_u8(packet_type::POSITION_DATA);
        write_vec3(&mut w, self.position);
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            position: read_vec3(&mut r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrientationData {
    pub orientation: Vec3,
}

impl OrientationData {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(13);
        w.write_u8(packet_type::ORIENTATION_DATA);
        write_vec3(&mut w, self.orientation);
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            orientation: read_vec3(&mut r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerPositionData {
    pub position: Vec3,
    pub orientation: Vec3,
}

/// 10 Hz snapshot of every combatant, indexed by player id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldUpdate {
    pub players: [PlayerPositionData; MAX_PLAYERS],
}

impl Default for WorldUpdate {
    fn default() -> Self {
        Self {
            players: [PlayerPositionData::default(); MAX_PLAYERS],
        }
    }
}

impl WorldUpdate {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(1 + MAX_PLAYERS * 24);
        w.write_u8(packet_type::WORLD_UPDATE);
        for entry in &self.players {
            write_vec3(&mut w, entry.position);
            write_vec3(&mut w, entry.orientation);
        }
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        let mut players = [PlayerPositionData::default(); MAX_PLAYERS];
        for entry in players.iter_mut() {
            entry.position = read_vec3(&mut r)?;
            entry.orientation = read_vec3(&mut r)?;
        }
        Ok(Self { players })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputData {
    pub player_id: u8,
    pub key_states: u8,
}

impl InputData {
    pub fn encode(&self) -> Vec<u8> {
        vec![packet_type::INPUT_DATA, self.player_id, self.key_states]
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            player_id: r.read_u8()?,
            key_states: r.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeaponInputData {
    pub player_id: u8,
    pub weapon_input: u8,
}

impl WeaponInputData {
    pub fn encode(&self) -> Vec<u8> {
        vec![packet_type::WEAPON_INPUT, self.player_id, self.weapon_input]
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            player_id: r.read_u8()?,
            weapon_input: r.read_u8()?,
        })
    }
}

// ============================================================
// Combat packets
// ============================================================

/// Client-reported hit (type 5, client to server).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitPacket {
    pub target_id: u8,
    pub hit_type: HitType,
}

impl HitPacket {
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            target_id: r.read_u8()?,
            hit_type: HitType::from_u8(r.read_u8()?)?,
        })
    }
}

/// Authoritative health update (type 5, server to client).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SetHp {
    pub hp: u8,
    /// 0 = fall damage, 1 = weapon damage.
    pub damage_type: u8,
    pub source: Vec3,
}

impl SetHp {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(15);
        w.write_u8(packet_type::SET_HP);
        w.write_u8(self.hp);
        w.write_u8(self.damage_type);
        write_vec3(&mut w, self.source);
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            hp: r.read_u8()?,
            damage_type: r.read_u8()?,
            source: read_vec3(&mut r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GrenadePacket {
    pub player_id: u8,
    pub fuse_length: f32,
    pub position: Vec3,
    pub velocity: Vec3,
}

impl GrenadePacket {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(30);
        w.write_u8(packet_type::GRENADE);
        w.write_u8(self.player_id);
        w.write_f32(self.fuse_length);
        write_vec3(&mut w, self.position);
        write_vec3(&mut w, self.velocity);
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            player_id: r.read_u8()?,
            fuse_length: r.read_f32()?,
            position: read_vec3(&mut r)?,
            velocity: read_vec3(&mut r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetTool {
    pub player_id: u8,
    pub tool: ItemType,
}

impl SetTool {
    pub fn encode(&self) -> Vec<u8> {
        vec![packet_type::SET_TOOL, self.player_id, self.tool as u8]
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            player_id: r.read_u8()?,
            tool: ItemType::from_u8(r.read_u8()?)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetColor {
    pub player_id: u8,
    pub color: Color3b,
}

impl SetColor {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(5);
        w.write_u8(packet_type::SET_COLOR);
        w.write_u8(self.player_id);
        write_color(&mut w, self.color);
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            player_id: r.read_u8()?,
            color: read_color(&mut r)?,
        })
    }
}

// ============================================================
// Roster packets
// ============================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ExistingPlayer {
    pub player_id: u8,
    pub team: u8,
    pub weapon: WeaponType,
    pub item: ItemType,
    pub kills: u32,
    pub color: Color3b,
    /// CP437 name, NUL-padded to 16 bytes on encode; the client side of
    /// this packet carries the name raw to end of frame.
    pub name: Vec<u8>,
}

impl ExistingPlayer {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(12 + PLAYER_NAME_LEN);
        w.write_u8(packet_type::EXISTING_PLAYER);
        w.write_u8(self.player_id);
        w.write_u8(self.team);
        w.write_u8(self.weapon as u8);
        w.write_u8(self.item as u8);
        w.write_u32(self.kills);
        write_color(&mut w, self.color);
        w.write_padded(&self.name, PLAYER_NAME_LEN);
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            player_id: r.read_u8()?,
            team: r.read_u8()?,
            weapon: WeaponType::from_u8(r.read_u8()?)?,
            item: ItemType::from_u8(r.read_u8()?)?,
            kills: r.read_u32()?,
            color: read_color(&mut r)?,
            name: r.read_rest().to_vec(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortPlayerData {
    pub player_id: u8,
    pub team: u8,
    pub weapon: WeaponType,
}

impl ShortPlayerData {
    pub fn encode(&self) -> Vec<u8> {
        vec![
            packet_type::SHORT_PLAYER_DATA,
            self.player_id,
            self.team,
            self.weapon as u8,
        ]
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            player_id: r.read_u8()?,
            team: r.read_u8()?,
            weapon: WeaponType::from_u8(r.read_u8()?)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveObject {
    pub object_id: u8,
    pub team: u8,
    pub position: Vec3,
}

impl MoveObject {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(15);
        w.write_u8(packet_type::MOVE_OBJECT);
        w.write_u8(self.object_id);
        w.write_u8(self.team);
        write_vec3(&mut w, self.position);
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            object_id: r.read_u8()?,
            team: r.read_u8()?,
            position: read_vec3(&mut r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatePlayer {
    pub player_id: u8,
    pub weapon: WeaponType,
    pub team: u8,
    pub position: Vec3,
    pub name: Vec<u8>,
}

impl CreatePlayer {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(16 + PLAYER_NAME_LEN);
        w.write_u8(packet_type::CREATE_PLAYER);
        w.write_u8(self.player_id);
        w.write_u8(self.weapon as u8);
        w.write_u8(self.team);
        write_vec3(&mut w, self.position);
        w.write_padded(&self.name, PLAYER_NAME_LEN);
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            player_id: r.read_u8()?,
            weapon: WeaponType::from_u8(r.read_u8()?)?,
            team: r.read_u8()?,
            position: read_vec3(&mut r)?,
            name: r.read_rest().to_vec(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerLeft {
    pub player_id: u8,
}

impl PlayerLeft {
    pub fn encode(&self) -> Vec<u8> {
        vec![packet_type::PLAYER_LEFT, self.player_id]
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            player_id: r.read_u8()?,
        })
    }
}

// ============================================================
// Block packets
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAction {
    pub player_id: u8,
    pub action: BlockActionType,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockAction {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(15);
        w.write_u8(packet_type::BLOCK_ACTION);
        w.write_u8(self.player_id);
        w.write_u8(self.action as u8);
        w.write_i32(self.x);
        w.write_i32(self.y);
        w.write_i32(self.z);
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            player_id: r.read_u8()?,
            action: BlockActionType::from_u8(r.read_u8()?)?,
            x: r.read_i32()?,
            y: r.read_i32()?,
            z: r.read_i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockLine {
    pub player_id: u8,
    pub start: (u32, u32, u32),
    pub end: (u32, u32, u32),
}

impl BlockLine {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(26);
        w.write_u8(packet_type::BLOCK_LINE);
        w.write_u8(self.player_id);
        w.write_u32(self.start.0);
        w.write_u32(self.start.1);
        w.write_u32(self.start.2);
        w.write_u32(self.end.0);
        w.write_u32(self.end.1);
        w.write_u32(self.end.2);
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            player_id: r.read_u8()?,
            start: (r.read_u32()?, r.read_u32()?, r.read_u32()?),
            end: (r.read_u32()?, r.read_u32()?, r.read_u32()?),
        })
    }
}

// ============================================================
// State data (type 15)
// ============================================================

/// Fixed total size of a CTF state-data frame. The classic client
/// tolerates shorter payloads; the server always writes the full size.
const CTF_FRAME_LEN: usize = 104;

pub const MAX_TERRITORIES: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CtfState {
    pub team1_score: u8,
    pub team2_score: u8,
    pub capture_limit: u8,
    /// Bit 1: team 1's intel is held (team 2 carries it).
    /// Bit 2: team 2's intel is held (team 1 carries it).
    pub held_intels: u8,
    pub carrier_ids: [u8; 2],
    pub team1_intel: Vec3,
    pub team2_intel: Vec3,
    pub team1_base: Vec3,
    pub team2_base: Vec3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Territory {
    pub position: Vec3,
    pub team: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TcState {
    pub territory_count: u8,
    pub territories: [Territory; MAX_TERRITORIES],
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModeState {
    Ctf(CtfState),
    Tc(TcState),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateData {
    pub player_id: u8,
    pub fog_color: Color3b,
    pub team1_color: Color3b,
    pub team2_color: Color3b,
    pub team1_name: Vec<u8>,
    pub team2_name: Vec<u8>,
    pub state: ModeState,
}

impl StateData {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(CTF_FRAME_LEN);
        w.write_u8(packet_type::STATE_DATA);
        w.write_u8(self.player_id);
        write_color(&mut w, self.fog_color);
        write_color(&mut w, self.team1_color);
        write_color(&mut w, self.team2_color);
        w.write_padded(&self.team1_name, TEAM_NAME_LEN);
        w.write_padded(&self.team2_name, TEAM_NAME_LEN);

        match &self.state {
            ModeState::Ctf(ctf) => {
                w.write_u8(WireGamemode::Ctf as u8);

                // bit 1 on the wire: team 2 carries team 1's intel.
                let team1_intel_held = ctf.held_intels & 1 != 0;
                let team2_intel_held = ctf.held_intels & 2 != 0;

                w.write_u8(ctf.team1_score);
                w.write_u8(ctf.team2_score);
                w.write_u8(ctf.capture_limit);
                let mut flags = 0u8;
                if team1_intel_held {
                    flags |= 1;
                }
                if team2_intel_held {
                    flags |= 2;
                }
                w.write_u8(flags);

                if team1_intel_held {
                    w.write_u8(ctf.carrier_ids[0]);
                    w.write_bytes(&[0u8; 11]);
                } else {
                    write_vec3(&mut w, ctf.team1_intel);
                }
                if team2_intel_held {
                    w.write_u8(ctf.carrier_ids[1]);
                    w.write_bytes(&[0u8; 11]);
                } else {
                    write_vec3(&mut w, ctf.team2_intel);
                }

                write_vec3(&mut w, ctf.team1_base);
                write_vec3(&mut w, ctf.team2_base);
                w.pad_to(CTF_FRAME_LEN);
            }
            ModeState::Tc(tc) => {
                w.write_u8(WireGamemode::Tc as u8);
                let count = tc.territory_count.min(MAX_TERRITORIES as u8);
                w.write_u8(count);
                for territory in tc.territories.iter().take(count as usize) {
                    write_vec3(&mut w, territory.position);
                    w.write_u8(territory.team);
                }
            }
        }

        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        let player_id = r.read_u8()?;
        let fog_color = read_color(&mut r)?;
        let team1_color = read_color(&mut r)?;
        let team2_color = read_color(&mut r)?;
        let team1_name = r.read_bytes(TEAM_NAME_LEN)?.to_vec();
        let team2_name = r.read_bytes(TEAM_NAME_LEN)?.to_vec();
        let mode = r.read_u8()?;

        let state = match mode {
            0 => {
                let team1_score = r.read_u8()?;
                let team2_score = r.read_u8()?;
                let capture_limit = r.read_u8()?;
                let held_intels = r.read_u8()?;
                let mut carrier_ids = [255u8; 2];
                let mut team1_intel = Vec3::default();
                let mut team2_intel = Vec3::default();
                if held_intels & 1 != 0 {
                    carrier_ids[0] = r.read_u8()?;
                    r.read_bytes(11)?;
                } else {
                    team1_intel = read_vec3(&mut r)?;
                }
                if held_intels & 2 != 0 {
                    carrier_ids[1] = r.read_u8()?;
                    r.read_bytes(11)?;
                } else {
                    team2_intel = read_vec3(&mut r)?;
                }
                let team1_base = read_vec3(&mut r)?;
                let team2_base = read_vec3(&mut r)?;
                ModeState::Ctf(CtfState {
                    team1_score,
                    team2_score,
                    capture_limit,
                    held_intels,
                    carrier_ids,
                    team1_intel,
                    team2_intel,
                    team1_base,
                    team2_base,
                })
            }
            1 => {
                let territory_count = r.read_u8()?;
                if territory_count as usize > MAX_TERRITORIES {
                    return Err(WireError::BadEnum {
                        field: "territory_count",
                        value: territory_count,
                    });
                }
                let mut territories = [Territory::default(); MAX_TERRITORIES];
                for territory in territories.iter_mut().take(territory_count as usize) {
                    territory.position = read_vec3(&mut r)?;
                    territory.team = r.read_u8()?;
                }
                ModeState::Tc(TcState {
                    territory_count,
                    territories,
                })
            }
            other => {
                return Err(WireError::BadEnum {
                    field: "gamemode",
                    value: other,
                })
            }
        };

        Ok(Self {
            player_id,
            fog_color,
            team1_color,
            team2_color,
            team1_name,
            team2_name,
            state,
        })
    }
}

// ============================================================
// Event packets
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillAction {
    pub player_id: u8,
    pub killer_id: u8,
    pub kill_type: KillType,
    pub respawn_time: u8,
}

impl KillAction {
    pub fn encode(&self) -> Vec<u8> {
        vec![
            packet_type::KILL_ACTION,
            self.player_id,
            self.killer_id,
            self.kill_type as u8,
            self.respawn_time,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub player_id: u8,
    pub chat_type: ChatType,
    /// CP437, raw to end of frame.
    pub message: Vec<u8>,
}

impl ChatMessage {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(3 + self.message.len());
        w.write_u8(packet_type::CHAT_MESSAGE);
        w.write_u8(self.player_id);
        w.write_u8(self.chat_type as u8);
        w.write_bytes(&self.message);
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        let player_id = r.read_u8()?;
        let chat_type = ChatType::from_u8(r.read_u8()?)?;
        Ok(Self {
            player_id,
            chat_type,
            message: r.read_rest().to_vec(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapStart {
    pub map_size: u32,
}

impl MapStart {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(5);
        w.write_u8(packet_type::MAP_START);
        w.write_u32(self.map_size);
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            map_size: r.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapChunk<'a> {
    pub data: &'a [u8],
}

impl MapChunk<'_> {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(1 + self.data.len());
        w.write_u8(packet_type::MAP_CHUNK);
        w.write_bytes(self.data);
        w.into_bytes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerritoryCapture {
    pub player_id: u8,
    pub entity_id: u8,
    pub winning: u8,
    pub state: u8,
}

impl TerritoryCapture {
    pub fn encode(&self) -> Vec<u8> {
        vec![
            packet_type::TERRITORY_CAPTURE,
            self.player_id,
            self.entity_id,
            self.winning,
            self.state,
        ]
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            player_id: r.read_u8()?,
            entity_id: r.read_u8()?,
            winning: r.read_u8()?,
            state: r.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressBar {
    pub entity_id: u8,
    pub capturing_team: u8,
    pub rate: i8,
    pub progress: f32,
}

impl ProgressBar {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(8);
        w.write_u8(packet_type::PROGRESS_BAR);
        w.write_u8(self.entity_id);
        w.write_u8(self.capturing_team);
        w.write_i8(self.rate);
        w.write_f32(self.progress);
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            entity_id: r.read_u8()?,
            capturing_team: r.read_u8()?,
            rate: r.read_i8()?,
            progress: r.read_f32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntelCapture {
    pub player_id: u8,
    pub winning: u8,
}

impl IntelCapture {
    pub fn encode(&self) -> Vec<u8> {
        vec![packet_type::INTEL_CAPTURE, self.player_id, self.winning]
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            player_id: r.read_u8()?,
            winning: r.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntelPickup {
    pub player_id: u8,
}

impl IntelPickup {
    pub fn encode(&self) -> Vec<u8> {
        vec![packet_type::INTEL_PICKUP, self.player_id]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IntelDrop {
    pub player_id: u8,
    pub position: Vec3,
}

impl IntelDrop {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(14);
        w.write_u8(packet_type::INTEL_DROP);
        w.write_u8(self.player_id);
        write_vec3(&mut w, self.position);
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            player_id: r.read_u8()?,
            position: read_vec3(&mut r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Restock {
    pub player_id: u8,
}

impl Restock {
    pub fn encode(&self) -> Vec<u8> {
        vec![packet_type::RESTOCK, self.player_id]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FogColor {
    pub alpha: u8,
    pub color: Color3b,
}

impl FogColor {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(5);
        w.write_u8(packet_type::FOG_COLOR);
        w.write_u8(self.alpha);
        write_color(&mut w, self.color);
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            alpha: r.read_u8()?,
            color: read_color(&mut r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeaponReload {
    pub player_id: u8,
    pub magazine_ammo: u8,
    pub reserve_ammo: u8,
}

impl WeaponReload {
    pub fn encode(&self) -> Vec<u8> {
        vec![
            packet_type::WEAPON_RELOAD,
            self.player_id,
            self.magazine_ammo,
            self.reserve_ammo,
        ]
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            player_id: r.read_u8()?,
            magazine_ammo: r.read_u8()?,
            reserve_ammo: r.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeTeam {
    pub player_id: u8,
    pub team: u8,
}

impl ChangeTeam {
    pub fn encode(&self) -> Vec<u8> {
        vec![packet_type::CHANGE_TEAM, self.player_id, self.team]
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            player_id: r.read_u8()?,
            team: r.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeWeapon {
    pub player_id: u8,
    pub weapon: WeaponType,
}

impl ChangeWeapon {
    pub fn encode(&self) -> Vec<u8> {
        vec![packet_type::CHANGE_WEAPON, self.player_id, self.weapon as u8]
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            player_id: r.read_u8()?,
            weapon: WeaponType::from_u8(r.read_u8()?)?,
        })
    }
}

// ============================================================
// Handshake, version probe and extension negotiation
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeInit {
    pub challenge: u32,
}

impl HandshakeInit {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(5);
        w.write_u8(packet_type::HANDSHAKE_INIT);
        w.write_u32(self.challenge);
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            challenge: r.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeReturn {
    pub challenge: u32,
}

impl HandshakeReturn {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(5);
        w.write_u8(packet_type::HANDSHAKE_RETURN);
        w.write_u32(self.challenge);
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        Ok(Self {
            challenge: r.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionRequest;

impl VersionRequest {
    pub fn encode(&self) -> Vec<u8> {
        vec![packet_type::VERSION_REQUEST]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionResponse {
    pub client_identifier: u8,
    pub major: i8,
    pub minor: i8,
    pub revision: i8,
    /// CP437 OS description, raw to end of frame.
    pub os_info: String,
}

impl VersionResponse {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::new();
        w.write_u8(packet_type::VERSION_RESPONSE);
        w.write_u8(self.client_identifier);
        w.write_i8(self.major);
        w.write_i8(self.minor);
        w.write_i8(self.revision);
        if let Some(bytes) = crate::strings::to_cp437_bytes(&self.os_info) {
            w.write_bytes(&bytes);
        }
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        let client_identifier = r.read_u8()?;
        let major = r.read_i8()?;
        let minor = r.read_i8()?;
        let revision = r.read_i8()?;
        let os_info = crate::strings::from_cp437_bytes(r.read_rest());
        Ok(Self {
            client_identifier,
            major,
            minor,
            revision,
            os_info,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionEntry {
    pub extension_id: u8,
    pub version: u8,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionInfo {
    pub entries: Vec<ExtensionEntry>,
}

impl ExtensionInfo {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(2 + self.entries.len() * 2);
        w.write_u8(packet_type::EXTENSION_INFO);
        w.write_u8(self.entries.len() as u8);
        for entry in &self.entries {
            w.write_u8(entry.extension_id);
            w.write_u8(entry.version);
        }
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        let count = r.read_u8()? as usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            entries.push(ExtensionEntry {
                extension_id: r.read_u8()?,
                version: r.read_u8()?,
            });
        }
        Ok(Self { entries })
    }
}

/// Extension 0 payload (packet 64, sub-packet 0): authoritative per-player
/// inventory and score for clients that negotiated it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerProperties {
    pub player_id: u8,
    pub hp: u8,
    pub blocks: u8,
    pub grenades: u8,
    pub magazine_ammo: u8,
    pub reserve_ammo: u8,
    pub score: u32,
}

impl PlayerProperties {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(12);
        w.write_u8(packet_type::PLAYER_PROPERTIES);
        w.write_u8(0); // sub-packet id
        w.write_u8(self.player_id);
        w.write_u8(self.hp);
        w.write_u8(self.blocks);
        w.write_u8(self.grenades);
        w.write_u8(self.magazine_ammo);
        w.write_u8(self.reserve_ammo);
        w.write_u32(self.score);
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = PacketReader::new(data);
        r.read_u8()?;
        r.read_u8()?;
        Ok(Self {
            player_id: r.read_u8()?,
            hp: r.read_u8()?,
            blocks: r.read_u8()?,
            grenades: r.read_u8()?,
            magazine_ammo: r.read_u8()?,
            reserve_ammo: r.read_u8()?,
            score: r.read_u32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_id_mapping_is_asymmetric() {
        assert_eq!(to_internal_team(0), Some(0));
        assert_eq!(to_internal_team(1), Some(1));
        assert_eq!(to_internal_team(2), Some(SPECTATOR_TEAM));
        assert_eq!(to_internal_team(255), Some(SPECTATOR_TEAM));
        assert_eq!(to_internal_team(7), None);
        assert_eq!(to_wire_team(SPECTATOR_TEAM), 2);
        assert_eq!(to_wire_team(1), 1);
    }

    #[test]
    fn position_round_trip() {
        let p = PositionData {
            position: Vec3::new(256.5, 128.25, 32.0),
        };
        let data = p.encode();
        assert_eq!(data.len(), 13);
        assert_eq!(data[0], packet_type::POSITION_DATA);
        assert_eq!(PositionData::decode(&data).unwrap(), p);
    }

    #[test]
    fn world_update_is_fixed_size() {
        let mut wu = WorldUpdate::default();
        wu.players[7].position = Vec3::new(1.0, 2.0, 3.0);
        wu.players[7].orientation = Vec3::new(0.0, 1.0, 0.0);
        let data = wu.encode();
        assert_eq!(data.len(), 1 + MAX_PLAYERS * 24);
        assert_eq!(WorldUpdate::decode(&data).unwrap(), wu);
    }

    #[test]
    fn grenade_round_trip() {
        let g = GrenadePacket {
            player_id: 4,
            fuse_length: 2.5,
            position: Vec3::new(10.5, 10.5, 5.0),
            velocity: Vec3::new(0.0, 0.0, 1.0),
        };
        assert_eq!(GrenadePacket::decode(&g.encode()).unwrap(), g);
    }

    #[test]
    fn existing_player_name_padded_to_sixteen() {
        let p = ExistingPlayer {
            player_id: 3,
            team: 1,
            weapon: WeaponType::Smg,
            item: ItemType::Gun,
            kills: 9,
            color: Color3b::rgb(0x10, 0x20, 0x30),
            name: b"Deuce".to_vec(),
        };
        let data = p.encode();
        assert_eq!(data.len(), 12 + PLAYER_NAME_LEN);
        let decoded = ExistingPlayer::decode(&data).unwrap();
        assert_eq!(&decoded.name[..5], b"Deuce");
        assert!(decoded.name[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn colors_travel_bgr() {
        let p = SetColor {
            player_id: 0,
            color: Color3b::rgb(0xAA, 0xBB, 0xCC),
        };
        let data = p.encode();
        assert_eq!(&data[2..5], &[0xCC, 0xBB, 0xAA]);
    }

    #[test]
    fn block_action_round_trip() {
        let p = BlockAction {
            player_id: 1,
            action: BlockActionType::GrenadeDestroy,
            x: 100,
            y: 200,
            z: 60,
        };
        let data = p.encode();
        assert_eq!(data.len(), 15);
        assert_eq!(BlockAction::decode(&data).unwrap(), p);
    }

    fn ctf_state_data(held_intels: u8) -> StateData {
        StateData {
            player_id: 12,
            fog_color: Color3b::rgb(128, 232, 255),
            team1_color: Color3b::rgb(0, 0, 255),
            team2_color: Color3b::rgb(0, 255, 0),
            team1_name: b"Blue".to_vec(),
            team2_name: b"Green".to_vec(),
            state: ModeState::Ctf(CtfState {
                team1_score: 2,
                team2_score: 5,
                capture_limit: 10,
                held_intels,
                carrier_ids: [6, 9],
                team1_intel: Vec3::new(100.0, 100.0, 40.0),
                team2_intel: Vec3::new(400.0, 400.0, 40.0),
                team1_base: Vec3::new(90.0, 90.0, 40.0),
                team2_base: Vec3::new(410.0, 410.0, 40.0),
            }),
        }
    }

    #[test]
    fn ctf_state_data_is_padded_to_full_size() {
        // 32-byte prefix + 52-byte CTF body, padded out to 104 total.
        let data = ctf_state_data(0).encode();
        assert_eq!(data.len(), CTF_FRAME_LEN);
    }

    #[test]
    fn ctf_state_data_round_trip_unheld() {
        let p = ctf_state_data(0);
        let decoded = StateData::decode(&p.encode()).unwrap();
        match (&p.state, &decoded.state) {
            (ModeState::Ctf(a), ModeState::Ctf(b)) => {
                assert_eq!(a.team1_intel, b.team1_intel);
                assert_eq!(a.team2_intel, b.team2_intel);
                assert_eq!(a.team1_base, b.team1_base);
                assert_eq!(b.held_intels, 0);
            }
            _ => panic!("wrong mode"),
        }
    }

    #[test]
    fn ctf_state_data_held_intel_writes_carrier_and_zeros() {
        let p = ctf_state_data(1);
        let data = p.encode();
        // Carrier id replaces team 1's intel position: byte right after
        // the score/limit/flags block.
        let intel_section = 32 + 4;
        assert_eq!(data[intel_section], 6);
        assert!(data[intel_section + 1..intel_section + 12]
            .iter()
            .all(|&b| b == 0));
        let decoded = StateData::decode(&data).unwrap();
        match decoded.state {
            ModeState::Ctf(ctf) => {
                assert_eq!(ctf.carrier_ids[0], 6);
                assert_eq!(ctf.held_intels, 1);
            }
            _ => panic!("wrong mode"),
        }
    }

    #[test]
    fn tc_state_data_round_trip() {
        let mut territories = [Territory::default(); MAX_TERRITORIES];
        territories[0] = Territory {
            position: Vec3::new(256.0, 256.0, 30.0),
            team: 1,
        };
        let p = StateData {
            player_id: 0,
            fog_color: Color3b::default(),
            team1_color: Color3b::default(),
            team2_color: Color3b::default(),
            team1_name: b"Blue".to_vec(),
            team2_name: b"Green".to_vec(),
            state: ModeState::Tc(TcState {
                territory_count: 1,
                territories,
            }),
        };
        let data = p.encode();
        // 32-byte prefix, count byte, one 13-byte territory.
        assert_eq!(data.len(), 32 + 1 + 13);
        let decoded = StateData::decode(&data).unwrap();
        match decoded.state {
            ModeState::Tc(tc) => {
                assert_eq!(tc.territory_count, 1);
                assert_eq!(tc.territories[0].team, 1);
            }
            _ => panic!("wrong mode"),
        }
    }

    #[test]
    fn version_response_round_trip() {
        let p = VersionResponse {
            client_identifier: b'o',
            major: 0,
            minor: 1,
            revision: 5,
            os_info: "Linux".to_string(),
        };
        assert_eq!(VersionResponse::decode(&p.encode()).unwrap(), p);
    }

    #[test]
    fn extension_info_round_trip() {
        let p = ExtensionInfo {
            entries: vec![
                ExtensionEntry {
                    extension_id: extension_id::PLAYER_PROPERTIES,
                    version: 1,
                },
                ExtensionEntry {
                    extension_id: extension_id::KICK_REASON,
                    version: 1,
                },
            ],
        };
        let data = p.encode();
        assert_eq!(data.len(), 6);
        assert_eq!(ExtensionInfo::decode(&data).unwrap(), p);
    }

    #[test]
    fn extension_info_truncated_entry_list_fails() {
        let data = [packet_type::EXTENSION_INFO, 3, 0, 1];
        assert!(matches!(
            ExtensionInfo::decode(&data),
            Err(WireError::TooShort { .. })
        ));
    }

    #[test]
    fn player_properties_round_trip() {
        let p = PlayerProperties {
            player_id: 30,
            hp: 100,
            blocks: 50,
            grenades: 3,
            magazine_ammo: 10,
            reserve_ammo: 50,
            score: 1234,
        };
        let data = p.encode();
        assert_eq!(data.len(), 12);
        assert_eq!(PlayerProperties::decode(&data).unwrap(), p);
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        assert!(HitType::from_u8(9).is_err());
        assert!(WeaponType::from_u8(3).is_err());
        assert!(BlockActionType::from_u8(4).is_err());
        let short = SetTool {
            player_id: 0,
            tool: ItemType::Spade,
        }
        .encode();
        let mut bad = short;
        bad[2] = 9;
        assert_eq!(
            SetTool::decode(&bad),
            Err(WireError::BadEnum {
                field: "tool",
                value: 9
            })
        );
    }

    #[test]
    fn handshake_round_trip() {
        let p = HandshakeInit {
            challenge: 0xCAFEBABE,
        };
        let data = p.encode();
        assert_eq!(data.len(), 5);
        assert_eq!(
            HandshakeReturn::decode(&HandshakeReturn { challenge: p.challenge }.encode())
                .unwrap()
                .challenge,
            0xCAFEBABE
        );
    }

    #[test]
    fn weapon_tables() {
        assert_eq!(default_magazine_ammo(WeaponType::Shotgun), 6);
        assert_eq!(default_reserve_ammo(WeaponType::Smg), 120);
        assert_eq!(fire_delay_millis(WeaponType::Rifle), 500);
        assert_eq!(pellet_count(WeaponType::Shotgun), 8);
    }
}
