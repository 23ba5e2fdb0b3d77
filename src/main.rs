use lontar::{
    statement::{self, Statement},
    storage::{btree::TreeConstants, table::Table},
};
use rustyline::{DefaultEditor, Result, error::ReadlineError};

const HISTORY_FILE: &str = "lontar_history.txt";

fn do_meta_command(command: &str, table: &mut Table) -> bool {
    match command {
        ".exit" | ".quit" => return false,
        ".btree" => match table.tree_display() {
            Ok(tree) => {
                println!("Tree:");
                print!("{tree}");
            }
            Err(err) => println!("Error: {err}"),
        },
        ".constants" => {
            println!("Constants:");
            println!("{}", TreeConstants);
        }
        ".help" => {
            println!(
                r#"
Statements:
  insert <id> <username> <email>
  select [<id>]
  update <id> <username> <email>
  delete <id>

Meta commands:
  .btree      - Print the tree structure
  .constants  - Print the storage layout constants
  .help       - Show this help message
  .exit       - Flush and exit
"#
            );
        }
        _ => println!("Unrecognized command: '{command}'"),
    }
    true
}

fn execute_statement(statement: Statement, table: &mut Table) {
    let result = match statement {
        Statement::Insert(row) => table.insert(&row),
        Statement::Select { key } => match table.select(key) {
            Ok(rows) => {
                for row in &rows {
                    println!("{row}");
                }
                Ok(())
            }
            Err(err) => Err(err),
        },
        Statement::Update { key, row } => table.update(key, &row),
        Statement::Delete { key } => table.delete(key),
    };
    match result {
        Ok(()) => println!("Executed."),
        Err(err) if err.is_domain_outcome() => println!("Error: {err}"),
        Err(err) => eprintln!("Storage error: {err}"),
    }
}

fn process_input(input: &str, table: &mut Table) -> bool {
    let input = input.trim();
    if input.is_empty() {
        return true;
    }
    if input.starts_with('.') {
        return do_meta_command(input, table);
    }
    match statement::prepare(input) {
        Ok(statement) => execute_statement(statement, table),
        Err(err) => println!("Error: {err}"),
    }
    true
}

fn main() -> Result<()> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "lontar.db".to_string());
    let mut table = match Table::open(&path) {
        Ok(table) => table,
        Err(err) => {
            eprintln!("Failed to open database '{path}': {err}");
            std::process::exit(1);
        }
    };

    let mut rl = DefaultEditor::new()?;
    let _ = rl.load_history(HISTORY_FILE);

    loop {
        match rl.readline("lontar> ") {
            Ok(line) => {
                let command = line.trim().to_string();
                if !command.is_empty() {
                    rl.add_history_entry(&command)?;
                    if !process_input(&command, &mut table) {
                        break;
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {err:?}");
                break;
            }
        }
    }

    let _ = rl.save_history(HISTORY_FILE);
    if let Err(err) = table.close() {
        eprintln!("Failed to flush database: {err}");
        std::process::exit(1);
    }
    Ok(())
}
