#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app_runtime;
mod app_types;
mod bridge_commands;
mod dialog_notifier;
mod exit_events;
mod fault_handler;
mod main_window;
mod startup_task;

pub(crate) use app_types::BackendState;

fn main() {
    app_runtime::run();
}
