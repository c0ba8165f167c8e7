//! L2CAP protocol and socket constants

// Basic L2CAP header: length (2), channel id (2)
pub const L2CAP_BASIC_HEADER_SIZE: usize = 4;

// Default signalling MTU; larger frames need the ACL path toward the console
pub const L2CAP_DEFAULT_MTU: usize = 672;

// MTU requested on every relayed socket
pub const L2CAP_MTU: u16 = 1024;

// Pending connections per listening socket
pub const L2CAP_LISTEN_BACKLOG: i32 = 10;

// Linux Bluetooth socket interface
pub const AF_BLUETOOTH: i32 = 31;
pub const BTPROTO_L2CAP: i32 = 0;
pub const SOL_BLUETOOTH: i32 = 274;
pub const SOL_L2CAP: i32 = 6;

// SOL_L2CAP options
pub const L2CAP_OPTIONS: i32 = 0x01;
pub const L2CAP_LM: i32 = 0x03;
pub const L2CAP_LM_MASTER: i32 = 0x0001;

// SOL_BLUETOOTH options
pub const BT_POWER: i32 = 9;
pub const BT_POWER_FORCE_ACTIVE_OFF: u8 = 0;
