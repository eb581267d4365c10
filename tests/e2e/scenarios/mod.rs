mod history;
mod persistence;
mod reconstruction;
