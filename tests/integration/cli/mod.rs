mod config;
mod migrate;
