//! Interactive loop

use std::io::{self, BufRead, Write};

use anyhow::Result;

use super::output::{print_history, print_response};
use crate::session::Session;

/// Interactive REPL over one session
pub struct Repl<'a> {
    session: &'a mut Session,
}

impl<'a> Repl<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Self { session }
    }

    pub async fn run(&mut self) -> Result<()> {
        println!("Connected to {}.", self.session.descriptor());
        println!("Ask a question, or type /help for commands, 'quit' to exit.\n");

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("> ");
            stdout.flush()?;

            let mut input = String::new();
            if stdin.lock().read_line(&mut input)? == 0 {
                break;
            }
            let input = input.trim();

            match input {
                "" => continue,
                "quit" | "exit" => break,
                "/help" => print_help(),
                "/history" => print_history(self.session.history()),
                "/reset" => {
                    self.session.reset();
                    println!("Conversation cleared.\n");
                }
                command if command.starts_with('/') => {
                    println!("Unknown command {}. Type /help for commands.\n", command)
                }
                question => {
                    let response = self.session.process_query(question).await;
                    print_response(&response);
                }
            }
        }

        Ok(())
    }
}

fn print_help() {
    println!("Commands:");
    println!("  /history   show this conversation");
    println!("  /reset     clear the conversation (keeps the connection)");
    println!("  /help      show this help");
    println!("  quit       exit\n");
}
