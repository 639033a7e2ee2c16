mod address;
mod dispatch;
mod fake;
mod session;
