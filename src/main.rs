use clap::Parser;
use miette::Result;
use qct::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Reset SIGPIPE so piping into `head` or `grep -q` exits quietly
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let mut global = cli.global;
    qct::logging::init(global.verbose, global.quiet);
    qct::cli::helpers::apply_default_format(&mut global);

    match cli.command {
        Commands::Init(args) => qct::cli::commands::init::run(args),
        Commands::Case(cmd) => qct::cli::commands::case::run(cmd, &global),
        Commands::Action(cmd) => qct::cli::commands::action::run(cmd, &global),
        Commands::Rca(cmd) => qct::cli::commands::rca::run(cmd, &global),
        Commands::Approval(cmd) => qct::cli::commands::approval::run(cmd, &global),
        Commands::Status(args) => qct::cli::commands::status::run(args, &global),
        Commands::Report(args) => qct::cli::commands::report::run(args, &global),
        Commands::Export(args) => qct::cli::commands::export::run(args, &global),
        Commands::Team(cmd) => cmd.run(&global),
        Commands::Completions(args) => qct::cli::commands::completions::run(args),
    }
}
