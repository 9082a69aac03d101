#![cfg(unix)]

// Integration suite for data factories: loading, refresh reuse, saving and
// deletion against real folders, through the public API only.
mod support;

use anyhow::{Context, Result};
use datafactory::{
    ContainerEvent, DataError, DataFactory, OBSOLETE_DIR_NAME, PathConfig, ResourceId,
    WritableDirError, resolve_writable_dir,
};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use support::{
    PATH_PROPERTY, Palette, WRITABLE_PROPERTY, bump_mtime, config_for, names, palette_factory,
    palette_factory_with_standard, write_palette_file,
};
use tempfile::TempDir;

struct Folders {
    _temp: TempDir,
    system: PathBuf,
    user: PathBuf,
}

// An installed folder and a per-user folder; only the latter is writable.
fn folders() -> Result<Folders> {
    let temp = TempDir::new().context("failed to create temp dir")?;
    let system = temp.path().join("share").join("palettes");
    let user = temp.path().join("home").join("palettes");
    fs::create_dir_all(&system)?;
    fs::create_dir_all(&user)?;
    Ok(Folders {
        _temp: temp,
        system,
        user,
    })
}

fn id_of(factory: &DataFactory<Palette>, name: &str) -> Result<ResourceId> {
    factory
        .find_by_name(name)
        .map(|resource| resource.id())
        .with_context(|| format!("no palette named '{name}'"))
}

#[test]
fn refresh_without_changes_keeps_identities() -> Result<()> {
    let dirs = folders()?;
    write_palette_file(&dirs.system, "warm.palette", &["Warm"])?;
    write_palette_file(&dirs.user, "mine.palette", &["Mine"])?;
    let config = config_for(&[&dirs.system, &dirs.user], &[&dirs.user]);

    let mut factory = palette_factory();
    factory.init(&config, false)?;
    let before = factory.container().ids();

    factory.refresh(&config)?;
    factory.refresh(&config)?;

    let mut after = factory.container().ids();
    let mut expected = before.clone();
    after.sort();
    expected.sort();
    assert_eq!(after, expected);
    Ok(())
}

#[test]
fn touched_file_is_reloaded_and_untouched_file_reused() -> Result<()> {
    let dirs = folders()?;
    let touched = write_palette_file(&dirs.user, "touched.palette", &["Touched"])?;
    write_palette_file(&dirs.user, "kept.palette", &["Kept"])?;
    let config = config_for(&[&dirs.user], &[&dirs.user]);

    let mut factory = palette_factory();
    factory.init(&config, false)?;
    let touched_id = id_of(&factory, "Touched")?;
    let kept_id = id_of(&factory, "Kept")?;

    bump_mtime(&touched)?;
    factory.refresh(&config)?;

    assert_ne!(id_of(&factory, "Touched")?, touched_id);
    assert_eq!(id_of(&factory, "Kept")?, kept_id);
    assert!(!factory.container().contains(touched_id));
    Ok(())
}

#[test]
fn refresh_drops_resources_of_deleted_files() -> Result<()> {
    let dirs = folders()?;
    let gone = write_palette_file(&dirs.user, "gone.palette", &["Gone"])?;
    write_palette_file(&dirs.user, "stays.palette", &["Stays"])?;
    let config = config_for(&[&dirs.user], &[&dirs.user]);

    let mut factory = palette_factory();
    factory.init(&config, false)?;
    let gone_id = id_of(&factory, "Gone")?;

    fs::remove_file(&gone)?;
    factory.refresh(&config)?;

    assert!(!factory.container().contains(gone_id));
    assert_eq!(names(&factory), vec!["Stays"]);
    Ok(())
}

#[test]
fn refresh_picks_up_new_files() -> Result<()> {
    let dirs = folders()?;
    let config = config_for(&[&dirs.user], &[&dirs.user]);
    let mut factory = palette_factory();
    factory.init(&config, false)?;
    assert!(factory.container().is_empty());

    write_palette_file(&dirs.user, "late.palette", &["Late"])?;
    factory.refresh(&config)?;

    assert_eq!(names(&factory), vec!["Late"]);
    Ok(())
}

#[test]
fn only_single_resource_files_in_writable_folders_are_deletable() -> Result<()> {
    let dirs = folders()?;
    write_palette_file(&dirs.user, "pair.palette", &["First", "Second"])?;
    write_palette_file(&dirs.user, "solo.palette", &["Solo"])?;
    write_palette_file(&dirs.system, "installed.palette", &["Installed"])?;
    let config = config_for(&[&dirs.system, &dirs.user], &[&dirs.user]);

    let mut factory = palette_factory();
    factory.init(&config, false)?;

    for name in ["First", "Second", "Installed"] {
        let resource = factory.find_by_name(name).context("loaded")?;
        assert!(!resource.is_deletable(), "{name} should not be deletable");
        assert!(!resource.is_writable(), "{name} should not be writable");
    }
    let solo = factory.find_by_name("Solo").context("loaded")?;
    assert!(solo.is_deletable());
    assert!(solo.is_writable());
    assert!(!solo.is_dirty());
    Ok(())
}

#[test]
fn user_palettes_sort_before_installed_ones() -> Result<()> {
    let dirs = folders()?;
    write_palette_file(&dirs.system, "a.palette", &["Alpha"])?;
    write_palette_file(&dirs.user, "z.palette", &["zulu"])?;
    let config = config_for(&[&dirs.system, &dirs.user], &[&dirs.user]);

    let mut factory = palette_factory_with_standard();
    factory.init(&config, false)?;

    assert_eq!(names(&factory), vec!["Standard", "zulu", "Alpha"]);
    Ok(())
}

#[test]
fn duplicate_names_follow_copy_rules() -> Result<()> {
    let mut factory = palette_factory();
    let foo = factory.new_resource("Foo").context("constructed")?;
    let numbered = factory.new_resource("Foo#3").context("constructed")?;

    let copy = factory.duplicate(foo).context("duplicated")?;
    assert_eq!(factory.get(copy).context("present")?.name(), "Foo copy");

    let copy_of_copy = factory.duplicate(copy).context("duplicated")?;
    assert_eq!(
        factory.get(copy_of_copy).context("present")?.name(),
        "Foo copy #1"
    );

    let numbered_copy = factory.duplicate(numbered).context("duplicated")?;
    assert_eq!(
        factory.get(numbered_copy).context("present")?.name(),
        "Foo #4"
    );
    assert!(factory.get(numbered_copy).context("present")?.path().is_none());
    Ok(())
}

#[test]
fn writable_dir_is_first_existing_writable_entry_in_search_path() -> Result<()> {
    let temp = TempDir::new()?;
    let a = temp.path().join("a");
    let b = temp.path().join("b");
    let c = temp.path().join("c");
    fs::create_dir(&b)?;
    let full = vec![a.clone(), b.clone(), c.clone()];

    assert_eq!(resolve_writable_dir(&full, &[c.clone(), b.clone()])?, b);
    assert_eq!(
        resolve_writable_dir(&full, &[c.clone()]),
        Err(WritableDirError::Missing(c.clone()))
    );
    assert_eq!(
        resolve_writable_dir(&[a.clone()], &[b.clone()]),
        Err(WritableDirError::NotInSearchPath)
    );
    assert_eq!(
        resolve_writable_dir(&full, &[]),
        Err(WritableDirError::NotConfigured)
    );
    Ok(())
}

#[test]
fn palette_lifecycle_scenario() -> Result<()> {
    let dirs = folders()?;
    for name in ["Bears", "Coldfire", "Ega", "Royal", "Tango"] {
        write_palette_file(&dirs.system, &format!("{name}.palette"), &[name])?;
    }
    write_palette_file(&dirs.user, "Mine.palette", &["Mine"])?;
    write_palette_file(&dirs.user, "Ours.palette", &["Ours"])?;
    let config = config_for(&[&dirs.system, &dirs.user], &[&dirs.user]);

    let mut factory = palette_factory();
    factory.init(&config, false)?;
    assert_eq!(factory.container().len(), 7);
    let installed = factory
        .container()
        .iter()
        .filter(|resource| !resource.is_deletable() && !resource.is_writable())
        .count();
    assert_eq!(installed, 5);

    let mine = factory.new_resource("MyPalette").context("constructed")?;
    assert!(factory.get(mine).context("present")?.path().is_none());
    assert_eq!(factory.container().len(), 8);

    factory.save_all(&config)?;
    let saved = factory.get(mine).context("present")?;
    let path = saved.path().context("file assigned")?.to_path_buf();
    assert_eq!(path.parent(), Some(dirs.user.as_path()));
    assert!(path.is_file());
    assert!(!saved.is_dirty());
    assert!(saved.is_deletable());

    factory.delete(mine, true)?;
    assert!(!factory.container().contains(mine));
    assert!(!path.exists());

    factory.refresh(&config)?;
    assert_eq!(factory.container().len(), 7);
    Ok(())
}

#[test]
fn unsaved_resources_with_clashing_file_names_get_separate_files() -> Result<()> {
    let dirs = folders()?;
    let config = config_for(&[&dirs.user], &[&dirs.user]);
    let mut factory = palette_factory();
    factory.init(&config, false)?;

    let spaced = factory.new_resource("My Palette").context("constructed")?;
    let dashed = factory.new_resource("My-Palette").context("constructed")?;
    factory.save_all(&config)?;

    let spaced_path = factory
        .get(spaced)
        .and_then(|resource| resource.path())
        .context("file assigned")?
        .to_path_buf();
    let dashed_path = factory
        .get(dashed)
        .and_then(|resource| resource.path())
        .context("file assigned")?
        .to_path_buf();
    assert_ne!(spaced_path, dashed_path);
    assert!(spaced_path.is_file());
    assert!(dashed_path.is_file());

    factory.refresh(&config)?;
    assert_eq!(factory.container().len(), 2);
    assert!(factory.container().contains(spaced));
    assert!(factory.container().contains(dashed));
    Ok(())
}

#[test]
fn refresh_gives_clashing_unsaved_resources_separate_files() -> Result<()> {
    let dirs = folders()?;
    let config = config_for(&[&dirs.user], &[&dirs.user]);
    let mut factory = palette_factory();
    factory.init(&config, false)?;

    factory.new_resource("Sun set").context("constructed")?;
    factory.new_resource("Sun:set").context("constructed")?;
    factory.refresh(&config)?;

    let mut files: Vec<String> = fs::read_dir(&dirs.user)?
        .map(|entry| -> Result<String> {
            Ok(entry?.file_name().to_string_lossy().into_owned())
        })
        .collect::<Result<_>>()?;
    files.sort();
    assert_eq!(files, vec!["Sun-set-1.palette", "Sun-set.palette"]);
    assert_eq!(factory.container().len(), 2);
    Ok(())
}

#[test]
fn refresh_saves_dirty_resources_first() -> Result<()> {
    let dirs = folders()?;
    let config = config_for(&[&dirs.user], &[&dirs.user]);
    let mut factory = palette_factory();
    factory.init(&config, false)?;

    let fresh = factory.new_resource("Fresh").context("constructed")?;
    factory.refresh(&config)?;

    assert!(dirs.user.join("Fresh.palette").is_file());
    let reloaded = factory.find_by_name("Fresh").context("still present")?;
    assert!(!reloaded.is_dirty());
    assert_eq!(reloaded.id(), fresh);
    Ok(())
}

#[test]
fn failed_disk_delete_still_removes_resource() -> Result<()> {
    let dirs = folders()?;
    let pair = write_palette_file(&dirs.user, "pair.palette", &["Left", "Right"])?;
    let config = config_for(&[&dirs.user], &[&dirs.user]);
    let mut factory = palette_factory();
    factory.init(&config, false)?;
    let left = id_of(&factory, "Left")?;

    let err = factory.delete(left, true).unwrap_err();

    assert!(matches!(err, DataError::NotDeletable { .. }));
    assert!(!factory.container().contains(left));
    assert!(pair.exists());
    Ok(())
}

#[test]
fn delete_without_disk_keeps_file() -> Result<()> {
    let dirs = folders()?;
    let solo = write_palette_file(&dirs.user, "solo.palette", &["Solo"])?;
    let config = config_for(&[&dirs.user], &[&dirs.user]);
    let mut factory = palette_factory();
    factory.init(&config, false)?;

    factory.delete(id_of(&factory, "Solo")?, false)?;

    assert!(factory.container().is_empty());
    assert!(solo.exists());
    Ok(())
}

#[test]
fn save_all_reports_missing_writable_folder_and_keeps_going() -> Result<()> {
    let dirs = folders()?;
    let solo = write_palette_file(&dirs.user, "solo.palette", &["Solo"])?;
    let config = config_for(&[&dirs.user], &[&dirs.user]);
    let mut factory = palette_factory();
    factory.init(&config, false)?;
    let solo_id = id_of(&factory, "Solo")?;
    factory
        .get_mut(solo_id)
        .context("present")?
        .content_mut()
        .swatches
        .clear();
    let unsaved = factory.new_resource("Unsaved").context("constructed")?;

    let broken = config_for(&[&dirs.user], &[&dirs.system]);
    let errors = factory.save_all(&broken).unwrap_err();

    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors.errors()[0],
        DataError::WritableDir(WritableDirError::NotInSearchPath)
    ));
    assert!(!factory.get(solo_id).context("present")?.is_dirty());
    assert!(!fs::read_to_string(&solo)?.contains("White"));
    assert!(factory.get(unsaved).context("present")?.path().is_none());
    Ok(())
}

#[test]
fn broken_files_are_reported_without_stopping_the_load() -> Result<()> {
    let dirs = folders()?;
    fs::write(dirs.user.join("broken.palette"), "not a palette\n")?;
    write_palette_file(&dirs.user, "fine.palette", &["Fine"])?;
    let config = config_for(&[&dirs.user], &[&dirs.user]);
    let mut factory = palette_factory();

    let errors = factory.init(&config, false).unwrap_err();

    assert_eq!(errors.len(), 1);
    assert!(matches!(errors.errors()[0], DataError::Load { .. }));
    assert_eq!(names(&factory), vec!["Fine"]);
    Ok(())
}

#[test]
fn obsolete_files_load_into_separate_container() -> Result<()> {
    let dirs = folders()?;
    write_palette_file(&dirs.user.join(OBSOLETE_DIR_NAME), "old.palette", &["Old"])?;
    write_palette_file(&dirs.user, "current.palette", &["Current"])?;
    let config = config_for(&[&dirs.user], &[&dirs.user]);
    let mut factory = palette_factory();

    factory.init(&config, false)?;
    factory.refresh(&config)?;

    assert_eq!(names(&factory), vec!["Current"]);
    assert_eq!(factory.obsolete().len(), 1);
    let old = factory.obsolete().find_by_name("Old").context("obsolete")?;
    assert!(!old.is_writable());
    assert!(!old.is_deletable());
    Ok(())
}

#[test]
fn subfolders_become_tags() -> Result<()> {
    let dirs = folders()?;
    write_palette_file(&dirs.user.join("web").join("flat"), "ui.palette", &["Ui"])?;
    let config = config_for(&[&dirs.user], &[&dirs.user]);
    let mut factory = palette_factory();
    factory.init(&config, false)?;

    let ui = factory.find_by_name("Ui").context("loaded")?;
    assert_eq!(ui.folder_tag(), Some("web"));
    assert!(ui.tags().iter().any(|tag| tag == "flat"));
    assert!(ui.tags().iter().any(|tag| tag == "web"));
    assert!(!ui.tags().iter().any(|tag| tag == "palettes"));
    Ok(())
}

#[test]
fn refresh_notifies_observers_once() -> Result<()> {
    let dirs = folders()?;
    let gone = write_palette_file(&dirs.user, "gone.palette", &["Gone"])?;
    let config = config_for(&[&dirs.user], &[&dirs.user]);
    let mut factory = palette_factory();
    factory.init(&config, false)?;
    let gone_id = id_of(&factory, "Gone")?;

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    factory.subscribe(move |event| sink.borrow_mut().push(event.clone()));

    fs::remove_file(&gone)?;
    write_palette_file(&dirs.user, "new.palette", &["New"])?;
    factory.refresh(&config)?;

    let events = events.borrow();
    assert_eq!(events.len(), 1);
    let ContainerEvent::Batch { added, removed } = &events[0] else {
        panic!("expected a batch event, got {:?}", events[0]);
    };
    assert_eq!(removed, &vec![gone_id]);
    assert_eq!(added, &vec![id_of(&factory, "New")?]);
    Ok(())
}

#[test]
fn search_path_expands_variables() -> Result<()> {
    let dirs = folders()?;
    write_palette_file(&dirs.user, "mine.palette", &["Mine"])?;
    let home = dirs.user.parent().context("user folder has a parent")?;
    let config = PathConfig::new()
        .with_variable("user_dir", home.display().to_string())
        .with_property(PATH_PROPERTY, "${user_dir}/palettes")
        .with_property(WRITABLE_PROPERTY, "${user_dir}/palettes");

    let mut factory = palette_factory();
    factory.init(&config, false)?;

    assert_eq!(names(&factory), vec!["Mine"]);
    assert!(factory.find_by_name("Mine").context("loaded")?.is_deletable());
    assert_eq!(factory.writable_dir(&config)?, dirs.user);
    Ok(())
}
