//! 5250 data stream codes

/// Escape byte preceding every command
pub const ESC: u8 = 0x04;

// Commands
/// Clear Unit
pub const CMD_CLEAR_UNIT: u8 = 0x40;
/// Clear Unit Alternate
pub const CMD_CLEAR_UNIT_ALTERNATE: u8 = 0x20;
/// Clear Format Table
pub const CMD_CLEAR_FORMAT_TABLE: u8 = 0x50;
/// Write To Display
pub const CMD_WRITE_TO_DISPLAY: u8 = 0x11;
/// Write Error Code
pub const CMD_WRITE_ERROR_CODE: u8 = 0x21;
/// Write Error Code To Window
pub const CMD_WRITE_ERROR_CODE_WINDOW: u8 = 0x22;
/// Read Input Fields
pub const CMD_READ_INPUT_FIELDS: u8 = 0x42;
/// Read MDT Fields
pub const CMD_READ_MDT_FIELDS: u8 = 0x52;
/// Read MDT Fields Alternate
pub const CMD_READ_MDT_FIELDS_ALT: u8 = 0x82;
/// Read Screen Immediate
pub const CMD_READ_SCREEN_IMMEDIATE: u8 = 0x62;
/// Read Immediate
pub const CMD_READ_IMMEDIATE: u8 = 0x72;
/// Save Screen
pub const CMD_SAVE_SCREEN: u8 = 0x02;
/// Restore Screen
pub const CMD_RESTORE_SCREEN: u8 = 0x12;
/// Roll
pub const CMD_ROLL: u8 = 0x23;
/// Write Structured Field
pub const CMD_WRITE_STRUCTURED_FIELD: u8 = 0xF3;

// Orders inside Write To Display
/// Start Of Header
pub const SOH: u8 = 0x01;
/// Repeat To Address
pub const RA: u8 = 0x02;
/// Erase To Address
pub const EA: u8 = 0x03;
/// Transparent Data
pub const TD: u8 = 0x10;
/// Set Buffer Address
pub const SBA: u8 = 0x11;
/// Write Extended Attribute
pub const WEA: u8 = 0x12;
/// Insert Cursor
pub const IC: u8 = 0x13;
/// Move Cursor
pub const MC: u8 = 0x14;
/// Write To Display Structured Field
pub const WDSF: u8 = 0x15;
/// Start Field
pub const SF: u8 = 0x1D;

// Control character 1
/// Any of these bits locks the keyboard
pub const CC1_LOCK_MASK: u8 = 0xE0;
/// Lock keyboard, leave modified-data tags alone
pub const CC1_LOCK: u8 = 0x20;

// Control character 2
/// Unlock the keyboard
pub const CC2_UNLOCK: u8 = 0x08;
/// Sound the alarm
pub const CC2_ALARM: u8 = 0x04;
/// Message light off
pub const CC2_MESSAGE_OFF: u8 = 0x02;
/// Message light on
pub const CC2_MESSAGE_ON: u8 = 0x01;

// Field format word (first byte)
/// Bypass (protected) field
pub const FFW_BYPASS: u8 = 0x20;
/// Field shift/edit specification bits
pub const FFW_SHIFT_MASK: u8 = 0x07;
/// Numeric only
pub const FFW_SHIFT_NUMERIC_ONLY: u8 = 0x03;
/// Digits only
pub const FFW_SHIFT_DIGITS_ONLY: u8 = 0x05;
/// Signed numeric
pub const FFW_SHIFT_SIGNED_NUMERIC: u8 = 0x07;

// GDS record header
/// Record type for general data stream
pub const GDS_RECORD_TYPE: [u8; 2] = [0x12, 0xA0];
/// Fixed part of the header before the variable header
pub const GDS_FIXED_HEADER: usize = 6;
/// Standard variable header length
pub const GDS_VAR_HEADER_LEN: u8 = 4;
/// Header flag: error
pub const FLAG_ERR: u8 = 0x80;
/// Header flag: attention
pub const FLAG_ATN: u8 = 0x40;
/// Header flag: system request (interrupt)
pub const FLAG_SRQ: u8 = 0x04;
/// Header flag: test request
pub const FLAG_TRQ: u8 = 0x02;
/// Header flag: help in error state
pub const FLAG_HLP: u8 = 0x01;

// GDS opcodes
/// No operation
pub const OPCODE_NOP: u8 = 0x00;
/// Invite
pub const OPCODE_INVITE: u8 = 0x01;
/// Output only
pub const OPCODE_OUTPUT_ONLY: u8 = 0x02;
/// Put/Get
pub const OPCODE_PUT_GET: u8 = 0x03;
/// Turn message light on
pub const OPCODE_MESSAGE_ON: u8 = 0x0B;
/// Turn message light off
pub const OPCODE_MESSAGE_OFF: u8 = 0x0C;
