mod media;
mod session;
