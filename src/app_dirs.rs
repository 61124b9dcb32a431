use directories::BaseDirs;
use std::path::PathBuf;

pub fn app_name() -> &'static str {
  if cfg!(debug_assertions) {
    "VpnPrefsDev"
  } else {
    "VpnPrefs"
  }
}

pub fn data_dir() -> PathBuf {
  #[cfg(test)]
  {
    if let Some(dir) = TEST_DATA_DIR.with(|cell| cell.borrow().clone()) {
      return dir;
    }
  }

  if let Ok(dir) = std::env::var("VPNPREFS_DATA_DIR") {
    return PathBuf::from(dir);
  }

  match BaseDirs::new() {
    Some(base_dirs) => base_dirs.data_local_dir().join(app_name()),
    None => PathBuf::from(".").join(app_name()),
  }
}

pub fn settings_dir() -> PathBuf {
  data_dir().join("settings")
}

pub fn preferences_file() -> PathBuf {
  settings_dir().join("preferences.json")
}

pub fn flags_file() -> PathBuf {
  settings_dir().join("flags.json")
}

pub fn reports_dir() -> PathBuf {
  data_dir().join("reports")
}

pub fn log_file() -> PathBuf {
  data_dir().join("vpnprefs.log")
}

#[cfg(test)]
thread_local! {
  static TEST_DATA_DIR: std::cell::RefCell<Option<PathBuf>> = const { std::cell::RefCell::new(None) };
}

#[cfg(test)]
pub struct TestDirGuard;

#[cfg(test)]
impl Drop for TestDirGuard {
  fn drop(&mut self) {
    TEST_DATA_DIR.with(|cell| *cell.borrow_mut() = None);
  }
}

#[cfg(test)]
pub fn set_test_data_dir(dir: PathBuf) -> TestDirGuard {
  TEST_DATA_DIR.with(|cell| *cell.borrow_mut() = Some(dir));
  TestDirGuard
}
