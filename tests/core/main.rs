mod helpers;
mod lifecycle;
mod search;
mod webhooks;
