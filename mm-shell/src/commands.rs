//! Built-in shell commands

use std::io::Write;
use std::ops::RangeInclusive;

use mm_protocol::{parse_int, Access, Record};

use crate::error::{CommandInputError, ShellError};
use crate::shell::{CommandContext, CommandSpec, Flow};

pub(crate) const BUILTIN: &[CommandSpec] = &[
    CommandSpec {
        name: "help",
        usage: "help [command]",
        help: "List commands, or show help for one command",
        handler: help,
        uses_driver: false,
    },
    CommandSpec {
        name: "info",
        usage: "info [record]",
        help: "List memory map records, or describe one record",
        handler: info,
        uses_driver: false,
    },
    CommandSpec {
        name: "read_reg",
        usage: "read_reg <record>",
        help: "Read the current value of a record",
        handler: read_reg,
        uses_driver: true,
    },
    CommandSpec {
        name: "write_reg",
        usage: "write_reg <record> <value>...",
        help: "Stage new value(s) for a record; apply with commit",
        handler: write_reg,
        uses_driver: true,
    },
    CommandSpec {
        name: "commit",
        usage: "commit",
        help: "Apply staged writes",
        handler: commit,
        uses_driver: true,
    },
    CommandSpec {
        name: "mcu_rst",
        usage: "mcu_rst",
        help: "Reset the device registers to their defaults",
        handler: mcu_rst,
        uses_driver: true,
    },
    CommandSpec {
        name: "version",
        usage: "version",
        help: "Show the device firmware version",
        handler: version,
        uses_driver: true,
    },
    CommandSpec {
        name: "special_cmd",
        usage: "special_cmd [value]",
        help: "Send the special command and print the device's answer",
        handler: special_cmd,
        uses_driver: true,
    },
    CommandSpec {
        name: "history",
        usage: "history",
        help: "Show the command history",
        handler: history,
        uses_driver: false,
    },
    CommandSpec {
        name: "exit",
        usage: "exit",
        help: "Leave the shell",
        handler: exit,
        uses_driver: false,
    },
    CommandSpec {
        name: "quit",
        usage: "quit",
        help: "Leave the shell",
        handler: exit,
        uses_driver: false,
    },
];

fn expect_args(
    command: &str,
    args: &[String],
    allowed: RangeInclusive<usize>,
) -> Result<(), CommandInputError> {
    if allowed.contains(&args.len()) {
        return Ok(());
    }
    let expected = match (allowed.start(), allowed.end()) {
        (lo, hi) if lo == hi => lo.to_string(),
        (lo, &usize::MAX) => format!("at least {}", lo),
        (lo, hi) => format!("{} or {}", lo, hi),
    };
    Err(CommandInputError::Arity {
        command: command.to_string(),
        expected,
        actual: args.len(),
    })
}

fn int_arg(text: &str) -> Result<i64, CommandInputError> {
    parse_int(text).ok_or_else(|| CommandInputError::Value(format!("invalid integer: '{}'", text)))
}

fn format_values(values: &[i64]) -> String {
    match values {
        [single] => single.to_string(),
        many => format!(
            "[{}]",
            many.iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn describe(record: &Record) -> String {
    let mut ty = record.ty.name().to_string();
    if record.array_size > 1 {
        ty.push_str(&format!("[{}]", record.array_size));
    }
    let access = match record.access {
        Access::ReadOnly => "ro",
        Access::ReadWrite => "rw",
    };
    format!("{:<20} @{:<4} {:<14} {}", record.name, record.offset, ty, access)
}

fn help(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<Flow, ShellError> {
    expect_args("help", args, 0..=1)?;

    if let Some(name) = args.first() {
        match ctx.table.get(name) {
            Some(spec) => writeln!(ctx.out, "{}\n    {}", spec.usage, spec.help)?,
            None => writeln!(ctx.out, "*** No help on {}", name)?,
        }
        return Ok(Flow::Continue);
    }

    writeln!(ctx.out, "Documented commands:")?;
    for spec in ctx.table.iter() {
        writeln!(ctx.out, "  {:<30} {}", spec.usage, spec.help)?;
    }
    Ok(Flow::Continue)
}

fn info(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<Flow, ShellError> {
    expect_args("info", args, 0..=1)?;
    let map = ctx.driver.memory_map();

    match args.first() {
        Some(name) => {
            let record = map
                .record(name)
                .map_err(|e| CommandInputError::Value(e.to_string()))?;
            writeln!(ctx.out, "{}", describe(record))?;
            writeln!(ctx.out, "  size:    {} bytes", record.size())?;
            writeln!(ctx.out, "  default: {}", record.default.unwrap_or(0))?;
            if !record.description.is_empty() {
                writeln!(ctx.out, "  {}", record.description)?;
            }
        }
        None => {
            for record in map.records() {
                writeln!(ctx.out, "{}", describe(record))?;
            }
            writeln!(ctx.out, "{} records, {} bytes", map.records().len(), map.size())?;
        }
    }
    Ok(Flow::Continue)
}

fn read_reg(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<Flow, ShellError> {
    expect_args("read_reg", args, 1..=1)?;
    let values = ctx.driver.read_reg(&args[0])?;
    writeln!(ctx.out, "{} = {}", args[0], format_values(&values))?;
    Ok(Flow::Continue)
}

fn write_reg(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<Flow, ShellError> {
    expect_args("write_reg", args, 2..=usize::MAX)?;
    let values = args[1..]
        .iter()
        .map(|a| int_arg(a))
        .collect::<Result<Vec<_>, _>>()?;
    ctx.driver.write_reg(&args[0], &values)?;
    writeln!(ctx.out, "staged {} = {}", args[0], format_values(&values))?;
    Ok(Flow::Continue)
}

fn commit(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<Flow, ShellError> {
    expect_args("commit", args, 0..=0)?;
    ctx.driver.commit()?;
    writeln!(ctx.out, "committed")?;
    Ok(Flow::Continue)
}

fn mcu_rst(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<Flow, ShellError> {
    expect_args("mcu_rst", args, 0..=0)?;
    ctx.driver.reset_mcu()?;
    writeln!(ctx.out, "reset")?;
    Ok(Flow::Continue)
}

fn version(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<Flow, ShellError> {
    expect_args("version", args, 0..=0)?;
    let version = ctx.driver.version()?;
    writeln!(ctx.out, "{}", version)?;
    Ok(Flow::Continue)
}

fn special_cmd(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<Flow, ShellError> {
    expect_args("special_cmd", args, 0..=1)?;
    let value = args.first().map(|a| int_arg(a)).transpose()?;
    let result = ctx.driver.special_cmd(value)?;
    writeln!(ctx.out, "{}", result)?;
    Ok(Flow::Continue)
}

fn history(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<Flow, ShellError> {
    expect_args("history", args, 0..=0)?;
    for (i, entry) in ctx.history.entries().iter().enumerate() {
        writeln!(ctx.out, "{:>5}  {}", i + 1, entry)?;
    }
    Ok(Flow::Continue)
}

fn exit(_ctx: &mut CommandContext<'_>, _args: &[String]) -> Result<Flow, ShellError> {
    Ok(Flow::Exit)
}
