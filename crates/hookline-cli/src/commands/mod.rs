pub mod check;
pub mod dispatch;
pub mod init;
