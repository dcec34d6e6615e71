mod concurrency;
mod lifecycle;
mod protocols;
