// SPDX-FileCopyrightText: 2025 The downdeck Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod events;
pub mod formatters;
pub mod view;
