#![forbid(unsafe_code)]

use std::env;
use std::path::Path;

use promptproof_tools::verify::verify_receipt_file;

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() != 1 {
        eprintln!("usage: promptproof_verify <receipt.json>");
        std::process::exit(1);
    }

    let outcome = verify_receipt_file(Path::new(&args[0]));
    println!("{}", outcome.render_report());
    std::process::exit(outcome.exit_code());
}
