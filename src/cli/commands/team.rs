//! `qct team` command - Team roster for role-based sign-off

use clap::{Args, Subcommand};
use console::style;
use miette::{bail, IntoDiagnostic, Result};

use crate::cli::helpers::{discover_project, print_structured, truncate_str};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::team::{Role, TeamMember, TeamRoster};

/// Team roster management
#[derive(Debug, Subcommand)]
pub enum TeamCommands {
    /// Create a team.yaml template
    Init(TeamInitArgs),
    /// Add or replace a team member
    Add(TeamAddArgs),
    /// List active team members
    List(TeamListArgs),
}

#[derive(Debug, Args)]
pub struct TeamInitArgs {
    /// Overwrite an existing team.yaml
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct TeamAddArgs {
    /// Member's full name
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub email: Option<String>,

    /// Identity used when signing (matches the configured author)
    #[arg(long)]
    pub username: String,

    /// Roles (comma-separated: engineering,quality,manager,director,admin)
    #[arg(long, value_delimiter = ',', required = true)]
    pub roles: Vec<Role>,
}

#[derive(Debug, Args)]
pub struct TeamListArgs {
    /// Filter by role
    #[arg(long, short = 'r')]
    pub role: Option<Role>,
}

impl TeamCommands {
    pub fn run(&self, global: &GlobalOpts) -> Result<()> {
        match self {
            TeamCommands::Init(args) => args.run(global),
            TeamCommands::Add(args) => args.run(global),
            TeamCommands::List(args) => args.run(global),
        }
    }
}

impl TeamInitArgs {
    pub fn run(&self, global: &GlobalOpts) -> Result<()> {
        let project = discover_project(global)?;
        let team_path = project.qct_dir().join("team.yaml");

        if team_path.exists() && !self.force {
            bail!(
                "Team roster already exists at {}\n\
                 Use --force to overwrite.",
                team_path.display()
            );
        }

        std::fs::write(&team_path, TeamRoster::default_template()).into_diagnostic()?;

        println!(
            "{} Created team roster at {}",
            style("✓").green(),
            style(team_path.display()).cyan()
        );
        println!("\nEdit this file to add your team members, or use:");
        println!(
            "  {}",
            style("qct team add --name \"Jane Smith\" --username jsmith --roles quality,manager")
                .yellow()
        );
        Ok(())
    }
}

impl TeamAddArgs {
    pub fn run(&self, global: &GlobalOpts) -> Result<()> {
        let project = discover_project(global)?;
        let mut roster = TeamRoster::load(&project)?.unwrap_or_default();

        let replaced = roster.find_member(&self.username).is_some();
        roster.add_member(TeamMember {
            name: self.name.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            roles: self.roles.clone(),
            active: true,
        });
        roster.save(&project).into_diagnostic()?;

        if !global.quiet {
            println!(
                "{} {} {} ({})",
                style("✓").green(),
                if replaced { "Updated" } else { "Added" },
                self.name,
                self.username
            );
            println!(
                "  Roles: {}",
                self.roles
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Ok(())
    }
}

impl TeamListArgs {
    pub fn run(&self, global: &GlobalOpts) -> Result<()> {
        let project = discover_project(global)?;

        let Some(roster) = TeamRoster::load(&project)? else {
            bail!("No team roster found. Run 'qct team init' to create one.");
        };

        let members: Vec<&TeamMember> = roster
            .active_members()
            .filter(|m| self.role.map_or(true, |r| m.has_role(r)))
            .collect();

        match global.format {
            OutputFormat::Json | OutputFormat::Yaml => {
                return print_structured(&members, global.format);
            }
            OutputFormat::Id => {
                members.iter().for_each(|m| println!("{}", m.username));
                return Ok(());
            }
            _ => {}
        }

        if members.is_empty() {
            println!("No team members found.");
            return Ok(());
        }

        println!(
            "{:<20} {:<25} {:<15} {}",
            "NAME", "EMAIL", "USERNAME", "ROLES"
        );
        println!("{}", "-".repeat(75));
        for member in members {
            let roles: Vec<String> = member.roles.iter().map(|r| r.to_string()).collect();
            println!(
                "{:<20} {:<25} {:<15} {}",
                truncate_str(&member.name, 18),
                truncate_str(member.email.as_deref().unwrap_or("-"), 23),
                truncate_str(&member.username, 13),
                roles.join(", ")
            );
        }
        Ok(())
    }
}
