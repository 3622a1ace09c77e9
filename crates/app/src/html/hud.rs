pub const HUD_INDEX_HTML: &str = r#"
<!doctype html>
<html lang="en" class="h-full dark">

<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Gesture Volume Control</title>

  <link rel="preconnect" href="https://fonts.googleapis.com" />
  <link rel="preconnect" href="https://fonts.gstatic.com" crossorigin />
  <link href="https://fonts.googleapis.com/css2?family=Rajdhani:wght@500;600;700&display=swap" rel="stylesheet" />
  <style type="text/tailwindcss">
    @theme {
      --font-tactical: "Rajdhani", ui-sans-serif, system-ui;
      --color-hud-bg: #050B16;
      --color-hud-panel: #0A1628;
      --color-hud-accent: #38bdf8;
      --color-hud-warning: #facc15;
      --color-hud-danger: #fb7185;
      --color-hud-success: #4ade80;
    }

    @layer base {
      html { @apply h-full; }
      body { @apply h-full bg-hud-bg text-slate-100 font-[Rajdhani]; }
      [x-cloak] { display: none !important; }
    }

    @layer components {
      .panel { @apply rounded-xl border border-slate-700/60 bg-hud-panel p-4; }
      .label { @apply text-xs uppercase tracking-widest text-slate-400; }
    }
  </style>
  <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
  <script defer src="https://cdn.jsdelivr.net/npm/alpinejs@3.13.5/dist/cdn.min.js" crossorigin="anonymous"></script>
</head>

<body x-data="gestureHud()" x-init="init()">
  <div class="flex h-full">
    <aside class="w-72 shrink-0 space-y-4 border-r border-slate-800 p-4">
      <h1 class="text-2xl font-bold text-hud-accent">Volume Control</h1>

      <div class="panel space-y-3">
        <label class="flex items-center justify-between">
          <span class="label">Start Camera</span>
          <input type="checkbox" class="h-5 w-5 accent-sky-400" :checked="running" @change="toggle($event.target.checked)" />
        </label>

        <label class="block">
          <span class="label">Camera index</span>
          <input type="number" min="0" max="3" step="1" x-model.number="cameraIndex" :disabled="running"
            class="mt-1 w-full rounded bg-slate-900 px-2 py-1 text-slate-100 disabled:opacity-50" />
        </label>

        <label class="block">
          <span class="label">Detection confidence <span x-text="confidence.toFixed(2)"></span></span>
          <input type="range" min="0.3" max="0.9" step="0.05" x-model.number="confidence" :disabled="running"
            class="mt-1 w-full accent-sky-400 disabled:opacity-50" />
        </label>
      </div>

      <div class="panel space-y-1" :class="levelClass">
        <span class="label">Status</span>
        <p class="text-lg" x-text="status.message"></p>
      </div>

      <div class="panel space-y-1" x-show="running" x-cloak>
        <span class="label">Volume</span>
        <p class="text-3xl font-bold text-fuchsia-400" x-text="status.volume ? Math.trunc(status.volume.percent) + '%' : '--'"></p>
        <p class="text-sm text-slate-400">
          FPS <span x-text="Math.trunc(status.fps)"></span>
          &middot; frame <span x-text="status.frame_number"></span>
        </p>
      </div>
    </aside>

    <main class="flex flex-1 items-center justify-center p-6">
      <img x-show="running" x-cloak :src="streamUrl" alt="Annotated camera feed"
        class="max-h-full max-w-full rounded-xl border border-slate-700" />
      <p x-show="!running" class="text-slate-500">Enable 'Start Camera' to run the app</p>
    </main>
  </div>

  <script>
    function gestureHud() {
      return {
        running: false,
        cameraIndex: 0,
        confidence: 0.7,
        streamUrl: '',
        prefilled: false,
        status: { message: '', level: 'info', volume: null, fps: 0, frame_number: 0 },

        get levelClass() {
          return {
            success: 'text-hud-success',
            warning: 'text-hud-warning',
            error: 'text-hud-danger',
          }[this.status.level] || 'text-slate-200';
        },

        async init() {
          await this.refresh();
          setInterval(() => this.refresh(), 500);
        },

        async refresh() {
          try {
            const response = await fetch('/status', { cache: 'no-store' });
            const status = await response.json();
            if (!this.prefilled && status.defaults) {
              this.cameraIndex = status.defaults.camera_index;
              this.confidence = status.defaults.detection_confidence;
              this.prefilled = true;
            }
            const running = status.state === 'running';
            if (running && !this.running) {
              this.streamUrl = '/stream.mjpg?t=' + Date.now();
            }
            this.running = running;
            this.status = status;
          } catch (err) {
            this.status = { ...this.status, level: 'error', message: 'Lost connection to the app' };
          }
        },

        async toggle(start) {
          const request = start
            ? fetch('/control/start', {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify({
                  camera_index: this.cameraIndex,
                  detection_confidence: this.confidence,
                }),
              })
            : fetch('/control/stop', { method: 'POST' });
          const response = await request;
          if (!response.ok) {
            const body = await response.json().catch(() => ({}));
            this.status = { ...this.status, level: 'error', message: body.error || response.statusText };
          }
          setTimeout(() => this.refresh(), 200);
        },
      };
    }
  </script>
</body>

</html>
"#;
