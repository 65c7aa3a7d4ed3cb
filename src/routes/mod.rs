/**
 * Routes Module
 * Read-only API route handlers
 */

pub mod blog;
pub mod health;
pub mod portfolio;
pub mod rss;
