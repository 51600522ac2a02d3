//! Interactive questions

use colored::Colorize;
use std::io::{BufRead, Write};
use zbx_migrate::{Action, CredentialStore, Credentials, EntityKind, Error, Result, Selection};

/// Line-based prompt over any input and output
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `question` and read one trimmed line
    fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{question}").map_err(closed)?;
        self.output.flush().map_err(closed)?;

        let mut line = String::new();
        if self.input.read_line(&mut line).map_err(closed)? == 0 {
            return Err(Error::InvalidSelection("input closed".into()));
        }
        Ok(line.trim().to_string())
    }

    fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{text}").map_err(closed)
    }

    /// Ask until the answer is y or n
    fn yes_no(&mut self, question: &str) -> Result<bool> {
        loop {
            match self.ask(question)?.to_lowercase().as_str() {
                "y" => return Ok(true),
                "n" => return Ok(false),
                _ => self.say(&" Invalid input".red().to_string())?,
            }
        }
    }

    pub fn choose_action(&mut self) -> Result<Action> {
        loop {
            self.say(" What do you want to do?\n   1. Back up\n   2. Restore")?;
            match self.ask("> ")?.as_str() {
                "1" => return Ok(Action::Backup),
                "2" => return Ok(Action::Restore),
                _ => self.say(&" Invalid choice".red().to_string())?,
            }
        }
    }

    /// Offer saved credentials, or ask for new ones and offer to save them
    pub fn credentials(&mut self, store: &dyn CredentialStore, action: Action) -> Result<Credentials> {
        let section = action.section();

        if let Some(saved) = store.load(section)? {
            self.say(&format!(
                " Saved connection:\n    URL: {}\n    Login: {}\n    Password: **********",
                saved.url.cyan(),
                saved.login
            ))?;
            if self.yes_no(" Use the saved connection? [y/n] > ")? {
                return Ok(saved);
            }
        }

        loop {
            self.say(&format!(" Connection to the {} server:", action.to_string().bold()))?;
            let credentials = Credentials::new(
                self.ask("    URL > ")?,
                self.ask("    Login > ")?,
                self.ask("    Password > ")?,
            );
            if let Err(e) = credentials.validate() {
                self.say(&format!(" {}", e.to_string().red()))?;
                continue;
            }

            if self.yes_no(" Save for later use? [y/n] > ")? {
                store.store(section, &credentials)?;
            }
            return Ok(credentials);
        }
    }

    /// Ask for menu numbers until at least one is valid
    pub fn choose_selection(&mut self, action: Action) -> Result<Selection> {
        let mut menu = format!(
            "\n Choose what to {action} (several numbers separated by spaces, e.g. 1 2 5)\n\n   0.  {}",
            "All".bold()
        );
        for kind in EntityKind::ALL {
            menu.push_str(&format!("\n   {:<3} {}", format!("{}.", kind.number()), kind.label()));
            let deps = kind.depends_on();
            if !deps.is_empty() {
                let numbers: Vec<String> = deps.iter().map(|d| d.number().to_string()).collect();
                menu.push_str(&format!(" (depends on {})", numbers.join(", ")).dimmed().to_string());
            }
        }

        loop {
            self.say(&menu)?;
            match Selection::parse(&self.ask(" > ")?) {
                Ok(selection) => return Ok(selection),
                Err(_) => self.say(&" Invalid choice".red().to_string())?,
            }
        }
    }

    /// Host group names to restore hosts from; empty means all
    pub fn host_groups(&mut self) -> Result<Vec<String>> {
        let answer = self.ask(
            " Host groups to restore hosts from, as exported file names without .json\n \
             (separated by spaces, empty for all) > ",
        )?;
        Ok(answer.split_whitespace().map(str::to_string).collect())
    }
}

fn closed(e: std::io::Error) -> Error {
    Error::InvalidSelection(format!("terminal error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use zbx_migrate::MemoryStore;

    fn prompt(input: &str) -> Prompt<Cursor<Vec<u8>>, Vec<u8>> {
        Prompt::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_selection_reprompts() {
        let mut p = prompt("x 42\n\n2 7\n");
        let selection = p.choose_selection(Action::Backup).unwrap();
        assert_eq!(selection.kinds(), &[EntityKind::GlobalMacros, EntityKind::UserGroups]);
    }

    #[test]
    fn test_action_choice() {
        assert_eq!(prompt("3\n2\n").choose_action().unwrap(), Action::Restore);
    }

    #[test]
    fn test_saved_credentials_used() {
        let store = MemoryStore::new();
        let saved = Credentials::new("http://zbx", "Admin", "zabbix");
        store.store("Zabbix_Backup", &saved).unwrap();

        let creds = prompt("y\n").credentials(&store, Action::Backup).unwrap();
        assert_eq!(creds, saved);
    }

    #[test]
    fn test_new_credentials_saved() {
        let store = MemoryStore::new();
        let creds = prompt("http://new\nmigrator\ns3cret\ny\n")
            .credentials(&store, Action::Restore)
            .unwrap();

        assert_eq!(creds.login, "migrator");
        assert_eq!(store.load("Zabbix_Restore").unwrap(), Some(creds));
    }

    #[test]
    fn test_closed_input() {
        assert!(prompt("").choose_action().is_err());
    }

    #[test]
    fn test_host_groups() {
        let groups = prompt("linux-servers  Network\n").host_groups().unwrap();
        assert_eq!(groups, vec!["linux-servers", "Network"]);
    }
}
