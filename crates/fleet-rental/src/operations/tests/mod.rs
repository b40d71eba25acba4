mod common;
mod payment;
mod penalty;
mod routing;
