mod harness;
mod read;
mod security;
