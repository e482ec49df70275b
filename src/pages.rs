use axum::response::Html;

pub async fn login() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

pub async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_PAGE)
}

const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html>
    <head>
        <meta charset="utf-8">
        <title>Spotdate</title>
        <style>
            body { font-family: sans-serif; background: #121212; color: #fff; text-align: center; padding-top: 15vh; }
            button { background: #1db954; color: #fff; border: none; padding: 14px 32px; border-radius: 24px; font-size: 16px; cursor: pointer; }
        </style>
    </head>
    <body>
        <h1>Spotdate</h1>
        <p>See your top artists, tracks and playlists.</p>
        <button onclick="authorize()">Log in with Spotify</button>
        <script>
            async function authorize() {
                const res = await fetch('/api/auth/authorize');
                const data = await res.json();
                window.location.href = data.auth_url;
            }
        </script>
    </body>
</html>
"#;

const DASHBOARD_PAGE: &str = r#"<!DOCTYPE html>
<html>
    <head>
        <meta charset="utf-8">
        <title>Spotdate - Dashboard</title>
        <style>
            body { font-family: sans-serif; background: #121212; color: #fff; margin: 0; }
            header { display: flex; justify-content: space-between; padding: 20px; border-bottom: 1px solid #282828; }
            main { max-width: 1000px; margin: 0 auto; padding: 20px; }
            ol { color: #b3b3b3; }
            .error { color: #ff6b6b; }
        </style>
    </head>
    <body>
        <header>
            <strong>Spotdate</strong>
            <button onclick="logout()">Log out</button>
        </header>
        <main>
            <select id="range" onchange="load()">
                <option value="short_term">Last 4 weeks</option>
                <option value="medium_term" selected>Last 6 months</option>
                <option value="long_term">All time</option>
            </select>
            <p id="error" class="error"></p>
            <h2>Top artists</h2><ol id="artists"></ol>
            <h2>Top tracks</h2><ol id="tracks"></ol>
            <h2>Playlists</h2><ol id="playlists"></ol>
        </main>
        <script>
            async function getJson(url) {
                const res = await fetch(url, { credentials: 'same-origin' });
                if (res.status === 401) {
                    window.location.href = '/';
                    throw new Error('Not authenticated');
                }
                const data = await res.json();
                if (!res.ok) throw new Error(data.detail);
                return data;
            }

            function render(id, items) {
                const list = document.getElementById(id);
                list.innerHTML = '';
                for (const item of items) {
                    const li = document.createElement('li');
                    li.textContent = item.name;
                    list.appendChild(li);
                }
            }

            async function load() {
                const range = document.getElementById('range').value;
                try {
                    const [artists, tracks, playlists] = await Promise.all([
                        getJson('/api/data/top-artists?time_range=' + range + '&limit=20'),
                        getJson('/api/data/top-tracks?time_range=' + range + '&limit=20'),
                        getJson('/api/data/playlists?limit=20'),
                    ]);
                    render('artists', artists.items);
                    render('tracks', tracks.items);
                    render('playlists', playlists.items);
                    document.getElementById('error').textContent = '';
                } catch (err) {
                    document.getElementById('error').textContent = err.message;
                }
            }

            async function logout() {
                await fetch('/api/auth/logout', { method: 'POST', credentials: 'same-origin' });
                window.location.href = '/';
            }

            load();
        </script>
    </body>
</html>
"#;
