use crate::SyncContext;
use crate::commands::context::CommandContext;
use crate::config::validator::ConfigValidator;
use crate::lock::SyncLock;
use crate::output;
use crate::store::{self, DriverKey, OverlaySettings, Reputations};
use crate::transaction::WriteTransaction;
use anyhow::{Result, bail};
use colored::Colorize;

/// Problems and warnings collected while checking.
#[derive(Debug, Default)]
struct Findings {
    problems: usize,
    warnings: usize,
}

impl Findings {
    fn ok(message: &str) {
        output::print(&format!("  {} {message}", "ok".green()));
    }

    fn warn(&mut self, message: &str) {
        self.warnings += 1;
        output::print(&format!("  {} {message}", "warning".yellow().bold()));
    }

    fn fail(&mut self, message: &str) {
        self.problems += 1;
        output::print(&format!("  {} {message}", "error".red().bold()));
    }
}

/// Execute the check command
///
/// Validates the configuration and both source documents, adds the reserved
/// `CrewChief` category when missing, and reports duplicate drivers. With
/// `fix_duplicates`, duplicates are removed from both files (first
/// occurrence wins) after a backup.
///
/// # Errors
///
/// Returns an error if any problem was found, if another synchronization
/// holds the lock for the same pair of files, or if fixing duplicates fails
pub fn execute(ctx: &SyncContext, fix_duplicates: bool) -> Result<()> {
    let mut findings = Findings::default();

    output::print(&format!("{}", "Configuration".bold()));
    check_config(ctx, &mut findings);

    // check may write both sources, so it must not interleave with a sync
    let _lock = SyncLock::acquire(&ctx.locks_dir(), ctx.overlay_path(), ctx.reputations_path())?;

    output::print(&format!("{}", "iOverlay".bold()));
    let overlay = check_overlay(ctx, &mut findings);

    output::print(&format!("{}", "CrewChief".bold()));
    let reputations = check_reputations(ctx, &mut findings);

    let duplicates_found = overlay
        .as_ref()
        .is_some_and(|o| !o.duplicate_identifiers().is_empty())
        || reputations
            .as_ref()
            .is_some_and(|r| !r.duplicate_keys().is_empty());

    if fix_duplicates {
        if let (Some(overlay), Some(reputations)) = (overlay, reputations) {
            if duplicates_found {
                remove_duplicates(ctx, overlay, reputations)?;
            } else {
                output::info("No duplicates to remove");
            }
        } else {
            bail!("Cannot fix duplicates until both source files load cleanly");
        }
    } else if duplicates_found {
        output::info("Run 'driversync check --fix-duplicates' to remove duplicate drivers");
    }

    output::print("");
    if findings.problems > 0 {
        bail!(
            "Check found {} problem(s) and {} warning(s)",
            findings.problems,
            findings.warnings
        );
    }
    if findings.warnings > 0 {
        output::warning(&format!("Check passed with {} warning(s)", findings.warnings));
    } else {
        output::success("All checks passed");
    }
    Ok(())
}

fn check_config(ctx: &SyncContext, findings: &mut Findings) {
    match ConfigValidator::new().inspect_file(&ctx.config_path) {
        Ok(report) => {
            for error in &report.errors {
                findings.fail(error);
            }
            for warning in &report.warnings {
                findings.warn(warning);
            }
            if report.is_clean() {
                Findings::ok(&format!("{}", ctx.config_path.display()));
            }
        }
        Err(e) => findings.fail(&format!("{e:#}")),
    }
}

fn check_overlay(ctx: &SyncContext, findings: &mut Findings) -> Option<OverlaySettings> {
    let path = ctx.overlay_path();
    let mut document = match store::read_json(path) {
        Ok(document) => document,
        Err(e) => {
            findings.fail(&e.to_string());
            return None;
        }
    };
    if !store::validate_source_a(&document) {
        findings.fail(&format!(
            "{}: missing modules.drivertagging.tagcategory / drivertag",
            path.display()
        ));
        return None;
    }

    match store::ensure_reserved_category(&mut document) {
        Ok(Some(id)) => match store::write_json(path, Some(&document)) {
            Ok(()) => Findings::ok(&format!("Added missing 'CrewChief' category (id {id})")),
            Err(e) => findings.fail(&format!("Could not add 'CrewChief' category: {e}")),
        },
        Ok(None) => {}
        Err(e) => {
            findings.fail(&e.to_string());
            return None;
        }
    }

    let overlay = match OverlaySettings::from_value(document) {
        Ok(overlay) => overlay,
        Err(e) => {
            findings.fail(&format!("{}: {e}", path.display()));
            return None;
        }
    };
    Findings::ok(&format!(
        "{} ({} categories, {} drivers)",
        path.display(),
        overlay.categories.len(),
        overlay.drivers.len()
    ));

    for name in ctx.config.enabled_categories.keys() {
        if ctx.config.is_category_enabled(name) && overlay.category_id(name).is_none() {
            findings.warn(&format!("Enabled category '{name}' does not exist in iOverlay"));
        }
    }
    if overlay
        .enabled_tag_ids(&ctx.config.enabled_categories)
        .is_empty()
    {
        findings.warn("No enabled category exists in iOverlay; synchronization will be skipped");
    }

    report_key_shapes(overlay.drivers.iter().map(|tag| &tag.identifier), findings);
    report_duplicates(&overlay.duplicate_identifiers(), findings);
    Some(overlay)
}

fn check_reputations(ctx: &SyncContext, findings: &mut Findings) -> Option<Reputations> {
    let path = ctx.reputations_path();
    match store::ensure_reputations_file(path) {
        Ok(true) => Findings::ok(&format!("Created empty {}", path.display())),
        Ok(false) => {}
        Err(e) => {
            findings.fail(&e.to_string());
            return None;
        }
    }

    let reputations = match Reputations::load(path) {
        Ok(reputations) => reputations,
        Err(e) => {
            findings.fail(&e.to_string());
            return None;
        }
    };
    Findings::ok(&format!("{} ({} drivers)", path.display(), reputations.len()));

    report_key_shapes(reputations.records.iter().map(|r| &r.customer_id), findings);
    report_duplicates(&reputations.duplicate_keys(), findings);
    Some(reputations)
}

fn report_key_shapes<'a>(keys: impl Iterator<Item = &'a DriverKey>, findings: &mut Findings) {
    let odd: Vec<&str> = keys
        .filter(|key| !key.has_canonical_length())
        .map(DriverKey::as_str)
        .collect();
    if !odd.is_empty() {
        findings.warn(&format!(
            "{} identifier(s) are not 5-8 digits long: {}",
            odd.len(),
            odd.join(", ")
        ));
    }
}

fn report_duplicates(duplicates: &[DriverKey], findings: &mut Findings) {
    if duplicates.is_empty() {
        Findings::ok("No duplicate drivers");
        return;
    }
    let keys: Vec<&str> = duplicates.iter().map(DriverKey::as_str).collect();
    findings.warn(&format!("Duplicate drivers: {}", keys.join(", ")));
}

fn remove_duplicates(
    ctx: &SyncContext,
    mut overlay: OverlaySettings,
    mut reputations: Reputations,
) -> Result<()> {
    ctx.backup_if_enabled();

    let removed_overlay = overlay.remove_duplicates();
    let removed_crewchief = reputations.remove_duplicates();

    let txn = WriteTransaction::begin(&[ctx.overlay_path(), ctx.reputations_path()])?;
    if removed_overlay > 0 {
        overlay.save(ctx.overlay_path())?;
    }
    if removed_crewchief > 0 {
        reputations.save(ctx.reputations_path())?;
    }
    txn.commit();

    output::success(&format!(
        "Removed {removed_overlay} duplicate(s) from iOverlay and {removed_crewchief} from CrewChief"
    ));
    Ok(())
}
