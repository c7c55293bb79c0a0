// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{value_parser, Arg, ArgAction, Command};

fn json_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print as pretty JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print as JSON lines"),
    )
}

fn opt(id: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(id).help(help)
}

fn req(id: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(id).required(true).help(help)
}

fn date_opt() -> Arg {
    opt("date", "Posting date YYYY-MM-DD (default: today)")
}

fn desc_opt() -> Arg {
    opt("desc", "Description")
}

fn debt_id() -> Arg {
    Arg::new("debt")
        .required(true)
        .value_parser(value_parser!(i64))
        .help("Debt id")
}

/// Loan parameters shared by `debt compare` and `debt adopt`.
fn loan_args(cmd: Command) -> Command {
    cmd.arg(req("principal", "Amount owed"))
        .arg(req("rate", "Interest rate in percent, e.g. 12 for 12%"))
        .arg(
            opt("rate-frequency", "annual|monthly")
                .default_value("annual"),
        )
        .arg(
            opt("frequency", "Payment frequency: weekly|fortnightly|monthly|quarterly|annually")
                .default_value("monthly"),
        )
        .arg(
            req("term", "Fixed-term length in payment periods")
                .value_parser(value_parser!(u32)),
        )
        .arg(opt("minimum", "Lender-stated minimum payment"))
        .arg(opt("income", "Income per payment period"))
        .arg(opt("living", "Living costs per payment period"))
        .arg(opt("obligations", "Other obligations per payment period"))
        .arg(opt("start", "First period starts YYYY-MM-DD (default: today)"))
        .arg(
            opt("max-periods", "Longest schedule to simulate")
                .value_parser(value_parser!(u32))
                .default_value("600"),
        )
}

pub fn build_cli() -> Command {
    Command::new("ledgerwise")
        .about("Double-entry personal ledger and debt payoff planner")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(false)
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(
            Command::new("account")
                .about("Manage accounts")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("name").required(true))
                        .arg(
                            Arg::new("type")
                                .long("type")
                                .required(true)
                                .value_parser(["asset", "liability", "income", "expense"]),
                        )
                        .arg(opt("category", "Free-form category"))
                        .arg(opt("opened", "Opening date YYYY-MM-DD (default: today)"))
                        .arg(opt("opening", "Opening balance, offset against equity")),
                )
                .subcommand(json_args(
                    Command::new("list").arg(opt("as-of", "Balances as of YYYY-MM-DD")),
                ))
                .subcommand(
                    Command::new("rename")
                        .arg(Arg::new("name").required(true))
                        .arg(Arg::new("new_name").required(true)),
                )
                .subcommand(
                    Command::new("categorize")
                        .arg(Arg::new("name").required(true))
                        .arg(Arg::new("category").help("Omit to clear")),
                )
                .subcommand(Command::new("deactivate").arg(Arg::new("name").required(true)))
                .subcommand(Command::new("reactivate").arg(Arg::new("name").required(true)))
                .subcommand(Command::new("rm").arg(Arg::new("name").required(true))),
        )
        .subcommand(
            Command::new("tx")
                .about("Record and inspect transactions")
                .subcommand(
                    Command::new("add")
                        .about("Post a balanced transaction from explicit legs")
                        .arg(date_opt())
                        .arg(req("desc", "Description"))
                        .arg(
                            opt("debit", "ACCOUNT=AMOUNT, repeatable")
                                .action(ArgAction::Append),
                        )
                        .arg(
                            opt("credit", "ACCOUNT=AMOUNT, repeatable")
                                .action(ArgAction::Append),
                        )
                        .arg(opt("note", "Notes")),
                )
                .subcommand(
                    Command::new("transfer")
                        .arg(req("from", "Source asset account"))
                        .arg(req("to", "Target asset account"))
                        .arg(req("amount", "Amount"))
                        .arg(date_opt())
                        .arg(desc_opt()),
                )
                .subcommand(
                    Command::new("expense")
                        .arg(req("from", "Paying asset or liability account"))
                        .arg(req("expense", "Expense account"))
                        .arg(req("amount", "Amount"))
                        .arg(date_opt())
                        .arg(desc_opt()),
                )
                .subcommand(
                    Command::new("income")
                        .arg(req("to", "Receiving asset account"))
                        .arg(req("income", "Income account"))
                        .arg(req("amount", "Amount"))
                        .arg(date_opt())
                        .arg(desc_opt()),
                )
                .subcommand(
                    Command::new("adjust")
                        .about("Reconcile an account to a stated actual balance")
                        .arg(req("account", "Asset or liability account"))
                        .arg(req("actual", "Stated actual balance"))
                        .arg(date_opt())
                        .arg(desc_opt()),
                )
                .subcommand(
                    Command::new("split")
                        .about("Post a windfall and route shares of it to other accounts")
                        .arg(req("deposit", "Asset account receiving the windfall"))
                        .arg(req("income", "Income account the windfall comes from"))
                        .arg(req("amount", "Windfall amount"))
                        .arg(
                            opt("alloc", "TARGET=SHARE with SHARE in (0,1], repeatable")
                                .action(ArgAction::Append),
                        )
                        .arg(date_opt())
                        .arg(desc_opt()),
                )
                .subcommand(
                    Command::new("void")
                        .arg(
                            Arg::new("id")
                                .required(true)
                                .value_parser(value_parser!(i64)),
                        )
                        .arg(date_opt()),
                )
                .subcommand(json_args(
                    Command::new("list")
                        .arg(opt("account", "Only entries on this account"))
                        .arg(opt("from", "From YYYY-MM-DD"))
                        .arg(opt("to", "To YYYY-MM-DD"))
                        .arg(
                            opt("limit", "Show at most N rows")
                                .value_parser(value_parser!(usize)),
                        ),
                ))
                .subcommand(json_args(
                    Command::new("show").arg(
                        Arg::new("id")
                            .required(true)
                            .value_parser(value_parser!(i64)),
                    ),
                )),
        )
        .subcommand(
            Command::new("report")
                .about("Derived balances")
                .subcommand(json_args(
                    Command::new("balances").arg(opt("as-of", "As of YYYY-MM-DD")),
                ))
                .subcommand(json_args(
                    Command::new("networth").arg(opt("as-of", "As of YYYY-MM-DD")),
                ))
                .subcommand(json_args(
                    Command::new("history")
                        .arg(req("account", "Account name"))
                        .arg(req("from", "From YYYY-MM-DD"))
                        .arg(opt("to", "To YYYY-MM-DD (default: today)")),
                )),
        )
        .subcommand(
            Command::new("debt")
                .about("Compare repayment methods and track debts")
                .subcommand(json_args(loan_args(
                    Command::new("compare").about("Project every repayment method"),
                )))
                .subcommand(loan_args(
                    Command::new("adopt")
                        .about("Persist a debt under the chosen method")
                        .arg(Arg::new("name").required(true))
                        .arg(
                            req("method", "fixed_term|minimum|aggressive")
                                .value_parser(["fixed_term", "minimum", "aggressive"]),
                        )
                        .arg(opt("proceeds", "Asset account that received the loan")),
                ))
                .subcommand(json_args(Command::new("list")))
                .subcommand(
                    Command::new("pay")
                        .arg(debt_id())
                        .arg(req("from", "Paying asset account"))
                        .arg(opt("amount", "Amount (default: planned payment)"))
                        .arg(date_opt()),
                )
                .subcommand(
                    Command::new("accrue")
                        .arg(debt_id())
                        .arg(req("expense", "Interest expense account"))
                        .arg(date_opt()),
                )
                .subcommand(Command::new("refresh").arg(debt_id()))
                .subcommand(json_args(
                    Command::new("schedule")
                        .about("Remaining schedule under the adopted method")
                        .arg(debt_id())
                        .arg(opt("start", "Project from YYYY-MM-DD (default: today)")),
                )),
        )
        .subcommand(
            Command::new("config")
                .about("Read and write settings")
                .subcommand(Command::new("get").arg(Arg::new("key").required(true)))
                .subcommand(
                    Command::new("set")
                        .arg(Arg::new("key").required(true))
                        .arg(Arg::new("value").required(true)),
                )
                .subcommand(json_args(Command::new("list"))),
        )
        .subcommand(Command::new("doctor").about("Verify ledger integrity"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn repeated_legs_are_collected() {
        let m = build_cli().get_matches_from([
            "ledgerwise", "tx", "add", "--desc", "Rent", "--debit", "Rent=900", "--credit",
            "Checking=900",
        ]);
        let (_, tx) = m.subcommand().unwrap();
        let (_, add) = tx.subcommand().unwrap();
        let debits: Vec<&String> = add.get_many::<String>("debit").unwrap().collect();
        assert_eq!(debits, ["Rent=900"]);
    }
}
