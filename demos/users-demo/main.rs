//! Runs the user table against the mock backend with the platform-local
//! cache attached. Sort, reorder, and scroll state survive a restart.
//!
//! Run with `cargo run` inside this directory. Logs go to `users-demo.log`
//! so they stay off the alternate screen.

use std::fs::File;

use bubbletea_rs::{quit, Cmd, KeyMsg, Model as BubbleTeaModel, Msg, Program};
use bubbletea_usergrid::key::new_binding;
use bubbletea_usergrid::key::Binding;
use bubbletea_usergrid::table;
use simplelog::{Config, LevelFilter, WriteLogger};

struct App {
    table: table::Model,
    quit: Binding,
}

impl BubbleTeaModel for App {
    fn init() -> (Self, Option<Cmd>) {
        let (table, cmd) = table::Model::init();
        let app = App {
            table,
            quit: new_binding(&["q", "esc", "ctrl+c"], "q", "quit"),
        };
        (app, cmd)
    }

    fn update(&mut self, msg: Msg) -> Option<Cmd> {
        if let Some(key_msg) = msg.downcast_ref::<KeyMsg>() {
            if self.quit.matches(key_msg) {
                return Some(quit());
            }
        }
        self.table.update(&msg)
    }

    fn view(&self) -> String {
        self.table.view()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log_file = File::create("users-demo.log")?;
    WriteLogger::init(LevelFilter::Debug, Config::default(), log_file)?;
    log::info!("starting users-demo");

    let program = Program::<App>::builder().alt_screen(true).build()?;
    program.run().await?;
    Ok(())
}
