/// Max apartment name length in bytes.
pub const MAX_NAME_LEN: usize = 256;

/// Max length of guest name, phone and identity number.
pub const MAX_SHORT_TEXT_LEN: usize = 256;

/// Max length of reservation notes and expense notes.
pub const MAX_NOTES_LEN: usize = 4096;

/// Max account name length, before sanitizing it into a file name.
pub const MAX_ACCOUNT_NAME_LEN: usize = 128;

/// Max accounts one process keeps open.
pub const MAX_ACCOUNTS: usize = 1024;
