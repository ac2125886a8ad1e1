mod channel;
mod helpers;
mod search;
mod toc;
